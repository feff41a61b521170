use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub environment: String,
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub whatsapp_verify_token: String,
    pub cron_secret: Option<String>,
    pub sweep_batch_size: i64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            environment: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            // Credentials are optional on purpose: without them the engine
            // saves messages but skips every send.
            whatsapp_access_token: env::var("WHATSAPP_ACCESS_TOKEN").ok(),
            whatsapp_phone_number_id: env::var("WHATSAPP_PHONE_NUMBER_ID").ok(),
            whatsapp_verify_token: get_env("WHATSAPP_VERIFY_TOKEN")?,
            cron_secret: env::var("CRON_SECRET").ok(),
            sweep_batch_size: env::var("SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
