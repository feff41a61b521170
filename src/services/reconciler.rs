use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dto::webhook_dto::StatusUpdate;
use crate::error::Result;
use crate::models::delivery_record::DeliveryStatus;
use crate::store::DeliveryStore;

/// What happened to one provider status event. Every non-`Applied` variant is
/// a deliberate drop: the provider retries aggressively on anything but a
/// success acknowledgment, so events with nowhere to land are logged and
/// swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(DeliveryStatus),
    /// No ledger row carries this provider message id. Either the callback
    /// outran the dispatch write or it belongs to an unrelated message.
    NoMatch,
    /// The record already progressed past the reported status.
    Stale,
    UnknownStatus,
}

/// Applies asynchronous delivery-status callbacks to the ledger rows written
/// at dispatch time, correlated by provider-assigned message id.
#[derive(Clone)]
pub struct StatusReconciler {
    deliveries: Arc<dyn DeliveryStore>,
}

impl StatusReconciler {
    pub fn new(deliveries: Arc<dyn DeliveryStore>) -> Self {
        Self { deliveries }
    }

    pub async fn apply(&self, update: &StatusUpdate) -> Result<ReconcileOutcome> {
        let Some(next) = DeliveryStatus::from_provider(&update.status) else {
            warn!(status = %update.status, "unknown provider status vocabulary, dropping");
            return Ok(ReconcileOutcome::UnknownStatus);
        };

        let Some(record) = self.deliveries.find_by_provider_id(&update.id).await? else {
            info!(provider_id = %update.id, "status event without matching delivery record, dropping");
            return Ok(ReconcileOutcome::NoMatch);
        };

        if !record.estado.can_advance_to(next) {
            debug!(
                provider_id = %update.id,
                current = ?record.estado,
                reported = ?next,
                "stale status event, keeping current state"
            );
            return Ok(ReconcileOutcome::Stale);
        }

        let error_detail = update
            .errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|e| e.title.clone());
        self.deliveries
            .update_status(record.id, next, &update.status, error_detail.as_deref())
            .await?;

        Ok(ReconcileOutcome::Applied(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::dto::webhook_dto::StatusErrorDetail;
    use crate::models::delivery_record::NewDeliveryRecord;
    use crate::store::memory::MemoryDeliveryStore;

    fn update(id: &str, status: &str) -> StatusUpdate {
        StatusUpdate {
            id: id.to_string(),
            status: status.to_string(),
            timestamp: None,
            recipient_id: None,
            errors: None,
        }
    }

    async fn seeded(store: &MemoryDeliveryStore, provider_id: &str) -> Uuid {
        store
            .insert_many(vec![NewDeliveryRecord {
                mensaje_id: Uuid::new_v4(),
                suscriptor_id: Uuid::new_v4(),
                estado: DeliveryStatus::Sent,
                whatsapp_message_id: Some(provider_id.to_string()),
                error_mensaje: None,
            }])
            .await
            .unwrap();
        store.snapshot()[0].id
    }

    #[tokio::test]
    async fn advances_a_record_through_delivered_and_read() {
        let store = MemoryDeliveryStore::new();
        let reconciler = StatusReconciler::new(Arc::new(store.clone()));
        seeded(&store, "wamid.abc").await;

        let outcome = reconciler.apply(&update("wamid.abc", "delivered")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied(DeliveryStatus::Delivered));

        let outcome = reconciler.apply(&update("wamid.abc", "read")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied(DeliveryStatus::Read));

        let record = &store.snapshot()[0];
        assert_eq!(record.estado, DeliveryStatus::Read);
        assert_eq!(record.whatsapp_status.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn unknown_provider_id_changes_nothing() {
        let store = MemoryDeliveryStore::new();
        let reconciler = StatusReconciler::new(Arc::new(store.clone()));
        seeded(&store, "wamid.abc").await;

        let outcome = reconciler
            .apply(&update("wamid.does-not-exist", "delivered"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::NoMatch);
        assert_eq!(store.snapshot()[0].estado, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn read_records_never_regress() {
        let store = MemoryDeliveryStore::new();
        let reconciler = StatusReconciler::new(Arc::new(store.clone()));
        seeded(&store, "wamid.abc").await;

        reconciler.apply(&update("wamid.abc", "read")).await.unwrap();
        let outcome = reconciler.apply(&update("wamid.abc", "delivered")).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Stale);
        assert_eq!(store.snapshot()[0].estado, DeliveryStatus::Read);
    }

    #[tokio::test]
    async fn failed_status_captures_the_error_title() {
        let store = MemoryDeliveryStore::new();
        let reconciler = StatusReconciler::new(Arc::new(store.clone()));
        seeded(&store, "wamid.abc").await;

        let mut failed = update("wamid.abc", "failed");
        failed.errors = Some(vec![StatusErrorDetail {
            code: 131026,
            title: "Message undeliverable".to_string(),
        }]);
        let outcome = reconciler.apply(&failed).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Applied(DeliveryStatus::Failed));
        let record = &store.snapshot()[0];
        assert_eq!(record.estado, DeliveryStatus::Failed);
        assert_eq!(record.error_mensaje.as_deref(), Some("Message undeliverable"));
    }

    #[tokio::test]
    async fn unknown_vocabulary_is_dropped() {
        let store = MemoryDeliveryStore::new();
        let reconciler = StatusReconciler::new(Arc::new(store.clone()));
        seeded(&store, "wamid.abc").await;

        let outcome = reconciler.apply(&update("wamid.abc", "warmed_up")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::UnknownStatus);
    }
}
