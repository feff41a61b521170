use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::transport::Transport;
use crate::utils::phone::normalize_phone;

const WHATSAPP_API_URL: &str = "https://graph.facebook.com/v18.0";

/// WhatsApp Cloud API client.
/// https://developers.facebook.com/docs/whatsapp/cloud-api
#[derive(Clone)]
pub struct WhatsAppClient {
    client: Client,
    phone_number_id: Option<String>,
    access_token: Option<String>,
    base_url: String,
}

impl WhatsAppClient {
    pub fn new(phone_number_id: Option<String>, access_token: Option<String>) -> Self {
        let client = Client::builder()
            // A hanging provider call is a transport failure, not a stall.
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        if phone_number_id.is_none() || access_token.is_none() {
            tracing::warn!("WhatsApp credentials not configured, messages will not be sent");
        }

        Self {
            client,
            phone_number_id,
            access_token,
            base_url: WHATSAPP_API_URL.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.whatsapp_phone_number_id.clone(),
            config.whatsapp_access_token.clone(),
        )
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.phone_number_id.as_deref(), self.access_token.as_deref()) {
            (Some(id), Some(token)) => Ok((id, token)),
            _ => Err(Error::Config(
                "WhatsApp credentials not configured".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Transport for WhatsAppClient {
    fn is_configured(&self) -> bool {
        self.phone_number_id.is_some() && self.access_token.is_some()
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        let (phone_number_id, access_token) = self.credentials()?;
        let recipient = normalize_phone(to);

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": recipient,
            "type": "text",
            "text": {
                "body": body,
                "preview_url": true,
            },
        });

        let response = self
            .client
            .post(format!("{}/{}/messages", self.base_url, phone_number_id))
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let data: JsonValue = response.json().await?;

        if !status.is_success() {
            return Err(Error::Transport {
                code: data["error"]["code"]
                    .as_i64()
                    .unwrap_or_else(|| i64::from(status.as_u16())),
                message: data["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown provider error")
                    .to_string(),
            });
        }

        data["messages"][0]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Internal("provider response missing message id".to_string())
            })
    }
}
