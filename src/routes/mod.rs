pub mod config_status;
pub mod cron;
pub mod health;
pub mod messages;
pub mod subscribers;
pub mod webhook;
