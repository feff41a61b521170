pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use sqlx::PgPool;

use crate::services::dispatch::DispatchService;
use crate::services::reconciler::StatusReconciler;
use crate::services::scheduler::SchedulerService;
use crate::services::transport::Transport;
use crate::services::whatsapp::WhatsAppClient;
use crate::store::postgres::{PgDeliveryStore, PgMessageStore, PgSubscriberStore};
use crate::store::{DeliveryStore, MessageStore, SubscriberStore};

/// The handful of config values route handlers need directly. Carried in the
/// state instead of read from the global config so tests can construct the
/// app without touching the environment.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub whatsapp_verify_token: String,
    pub cron_secret: Option<String>,
    pub environment: String,
}

#[derive(Clone)]
pub struct AppState {
    pub messages: Arc<dyn MessageStore>,
    pub subscribers: Arc<dyn SubscriberStore>,
    pub deliveries: Arc<dyn DeliveryStore>,
    pub transport: Arc<dyn Transport>,
    pub dispatch_service: DispatchService,
    pub scheduler_service: SchedulerService,
    pub reconciler: StatusReconciler,
    pub settings: AppSettings,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let settings = AppSettings {
            whatsapp_verify_token: config.whatsapp_verify_token.clone(),
            cron_secret: config.cron_secret.clone(),
            environment: config.environment.clone(),
        };
        Self::from_parts(
            Arc::new(PgMessageStore::new(pool.clone())),
            Arc::new(PgSubscriberStore::new(pool.clone())),
            Arc::new(PgDeliveryStore::new(pool)),
            Arc::new(WhatsAppClient::from_config(config)),
            settings,
            config.sweep_batch_size,
        )
    }

    pub fn from_parts(
        messages: Arc<dyn MessageStore>,
        subscribers: Arc<dyn SubscriberStore>,
        deliveries: Arc<dyn DeliveryStore>,
        transport: Arc<dyn Transport>,
        settings: AppSettings,
        sweep_batch_size: i64,
    ) -> Self {
        let dispatch_service = DispatchService::new(
            messages.clone(),
            subscribers.clone(),
            deliveries.clone(),
            transport.clone(),
        );
        let scheduler_service =
            SchedulerService::new(messages.clone(), dispatch_service.clone(), sweep_batch_size);
        let reconciler = StatusReconciler::new(deliveries.clone());

        Self {
            messages,
            subscribers,
            deliveries,
            transport,
            dispatch_service,
            scheduler_service,
            reconciler,
            settings,
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/messages",
            get(routes::messages::list_messages).post(routes::messages::create_message),
        )
        .route(
            "/api/subscribers",
            get(routes::subscribers::list_subscribers),
        )
        .route(
            "/api/whatsapp/webhook",
            get(routes::webhook::verify_webhook).post(routes::webhook::receive_events),
        )
        .route(
            "/api/cron/send-scheduled",
            get(routes::cron::send_scheduled),
        )
        .route(
            "/api/config/status",
            get(routes::config_status::config_status),
        )
        .with_state(state)
}
