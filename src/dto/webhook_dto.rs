//! Shapes of the WhatsApp Cloud API webhook traffic. Everything is optional
//! or defaulted: Meta's payloads vary by event kind and the handler must
//! never reject one outright.

use serde::Deserialize;

/// Query parameters of the verification handshake
/// (`GET /api/whatsapp/webhook`).
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<StatusUpdate>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
}

/// An inbound user message; only `type == "text"` carries a command.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextBody>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContact {
    pub wa_id: String,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
}

/// A per-recipient delivery status event.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    /// The provider-assigned message id handed out at send time.
    pub id: String,
    pub status: String,
    pub timestamp: Option<String>,
    pub recipient_id: Option<String>,
    pub errors: Option<Vec<StatusErrorDetail>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusErrorDetail {
    pub code: i64,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_inbound_text_event() {
        let raw = serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123456",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": { "phone_number_id": "111" },
                        "contacts": [{
                            "wa_id": "5491155551234",
                            "profile": { "name": "Marta" }
                        }],
                        "messages": [{
                            "from": "5491155551234",
                            "id": "wamid.xyz",
                            "type": "text",
                            "timestamp": "1700000000",
                            "text": { "body": "ALTA" }
                        }]
                    }
                }]
            }]
        });

        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let value = &payload.entry[0].changes[0].value;
        assert_eq!(value.messages[0].from, "5491155551234");
        assert_eq!(value.messages[0].text.as_ref().unwrap().body, "ALTA");
        assert_eq!(
            value.contacts[0].profile.as_ref().unwrap().name.as_deref(),
            Some("Marta")
        );
    }

    #[test]
    fn parses_a_status_event_with_errors() {
        let raw = serde_json::json!({
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {
                        "statuses": [{
                            "id": "wamid.abc",
                            "status": "failed",
                            "timestamp": "1700000001",
                            "recipient_id": "5491155551234",
                            "errors": [{ "code": 131026, "title": "Message undeliverable" }]
                        }]
                    }
                }]
            }]
        });

        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let status = &payload.entry[0].changes[0].value.statuses[0];
        assert_eq!(status.id, "wamid.abc");
        assert_eq!(status.status, "failed");
        assert_eq!(status.errors.as_ref().unwrap()[0].code, 131026);
    }

    #[test]
    fn tolerates_events_without_messages_or_statuses() {
        let raw = serde_json::json!({ "entry": [{ "changes": [{ "field": "messages", "value": {} }] }] });
        let payload: WebhookPayload = serde_json::from_value(raw).unwrap();
        let value = &payload.entry[0].changes[0].value;
        assert!(value.messages.is_empty());
        assert!(value.statuses.is_empty());
    }
}
