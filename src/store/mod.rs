//! Persistence seams for the dispatch core.
//!
//! Every store is a narrow `async_trait` interface so the dispatch engine,
//! scheduler sweep and status reconciler can run against Postgres in
//! production and against the in-memory implementations in tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::delivery_record::{DeliveryRecord, DeliveryStatus, NewDeliveryRecord};
use crate::models::message::{Message, NewMessage};
use crate::models::subscriber::Subscriber;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, new: NewMessage) -> Result<Message>;

    async fn get(&self, id: Uuid) -> Result<Option<Message>>;

    /// Latest messages first, for the dashboard feed.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Message>>;

    /// Scheduled messages whose send time has passed, oldest first, capped to
    /// `limit` per sweep invocation.
    async fn due_scheduled(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Message>>;

    /// Flips the message to `enviado` and stamps `enviado_en`, but only from a
    /// dispatchable state. Returns false when another invocation got there
    /// first; that persisted row-level update is the concurrency guard.
    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool>;

    /// Flips a still-scheduled message to `fallido`. A no-op (false) if the
    /// message already left the scheduled state.
    async fn mark_failed(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Opt-in: inserts the canonical phone or reactivates the existing row.
    /// The unique phone key guarantees repeated opt-ins never duplicate.
    async fn upsert_active(&self, telefono: &str, nombre: Option<&str>) -> Result<Subscriber>;

    /// Opt-out: marks the row inactive, keeping it for historical records.
    async fn deactivate(&self, telefono: &str) -> Result<bool>;

    /// The roster: currently active subscribers.
    async fn active(&self) -> Result<Vec<Subscriber>>;

    async fn list(&self) -> Result<Vec<Subscriber>>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Writes one ledger row per recipient. Re-dispatch tolerance: rows that
    /// already exist for the (message, subscriber) pair are left untouched.
    async fn insert_many(&self, records: Vec<NewDeliveryRecord>) -> Result<()>;

    /// Looks a record up by the provider-assigned message id, the correlation
    /// key for status callbacks.
    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<DeliveryRecord>>;

    async fn update_status(
        &self,
        id: Uuid,
        estado: DeliveryStatus,
        provider_status: &str,
        error_mensaje: Option<&str>,
    ) -> Result<()>;

    async fn for_message(&self, mensaje_id: Uuid) -> Result<Vec<DeliveryRecord>>;
}
