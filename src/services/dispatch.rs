use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::delivery_record::{DeliveryStatus, NewDeliveryRecord};
use crate::models::message::Message;
use crate::services::transport::Transport;
use crate::store::{DeliveryStore, MessageStore, SubscriberStore};
use crate::utils::phone::normalize_phone;

/// Result of one dispatch attempt. Skip variants are deliberate no-op
/// branches, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Fan-out ran; the message is now `enviado`. Partial recipient failures
    /// are captured per record and never fail the message itself.
    Completed { enviados: usize, fallidos: usize },
    /// Transport credentials are missing; the message was left untouched and
    /// no ledger rows were written.
    NotConfigured,
    /// Another invocation already moved the message out of a dispatchable
    /// state. No sends, no new records.
    AlreadyHandled,
}

/// Turns one logical message into N outbound sends and one ledger row per
/// roster member.
#[derive(Clone)]
pub struct DispatchService {
    messages: Arc<dyn MessageStore>,
    subscribers: Arc<dyn SubscriberStore>,
    deliveries: Arc<dyn DeliveryStore>,
    transport: Arc<dyn Transport>,
}

impl DispatchService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        subscribers: Arc<dyn SubscriberStore>,
        deliveries: Arc<dyn DeliveryStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            messages,
            subscribers,
            deliveries,
            transport,
        }
    }

    /// Sends `message` to the full active roster now.
    ///
    /// Safe to invoke more than once for the same message: the guarded state
    /// flip in `mark_sent` is the single source of truth for "already
    /// handled", so a repeat invocation is a no-op with no provider sends.
    pub async fn dispatch_now(&self, message: &Message) -> Result<DispatchOutcome> {
        if !self.transport.is_configured() {
            warn!(mensaje_id = %message.id, "WhatsApp not configured, skipping dispatch");
            return Ok(DispatchOutcome::NotConfigured);
        }

        // Roster first: a persistence failure here leaves the message in its
        // prior state so the next invocation can retry cleanly.
        let roster = self.subscribers.active().await?;

        // Claim the message. First writer wins; the loser observes the
        // already-updated state and skips.
        if !self.messages.mark_sent(message.id, Utc::now()).await? {
            info!(mensaje_id = %message.id, "message already dispatched, skipping");
            return Ok(DispatchOutcome::AlreadyHandled);
        }

        if roster.is_empty() {
            info!(mensaje_id = %message.id, "no active subscribers, message marked sent");
            return Ok(DispatchOutcome::Completed {
                enviados: 0,
                fallidos: 0,
            });
        }

        let phones: Vec<String> = roster
            .iter()
            .map(|s| normalize_phone(&s.telefono))
            .collect();
        let outcome = self.transport.send_bulk(&phones, &message.contenido).await;

        let mut records = Vec::with_capacity(roster.len());
        for (subscriber, telefono) in roster.iter().zip(&phones) {
            let record = match outcome
                .succeeded
                .iter()
                .find(|sent| &sent.telefono == telefono)
            {
                Some(sent) => NewDeliveryRecord {
                    mensaje_id: message.id,
                    suscriptor_id: subscriber.id,
                    estado: DeliveryStatus::Sent,
                    whatsapp_message_id: Some(sent.whatsapp_message_id.clone()),
                    error_mensaje: None,
                },
                None => NewDeliveryRecord {
                    mensaje_id: message.id,
                    suscriptor_id: subscriber.id,
                    estado: DeliveryStatus::Failed,
                    whatsapp_message_id: None,
                    error_mensaje: outcome
                        .failed
                        .iter()
                        .find(|f| &f.telefono == telefono)
                        .map(|f| f.error.clone()),
                },
            };
            records.push(record);
        }
        self.deliveries.insert_many(records).await?;

        info!(
            mensaje_id = %message.id,
            enviados = outcome.succeeded.len(),
            fallidos = outcome.failed.len(),
            "dispatch complete"
        );
        Ok(DispatchOutcome::Completed {
            enviados: outcome.succeeded.len(),
            fallidos: outcome.failed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::error::Error;
    use crate::models::message::{MessageCategory, MessageStatus, NewMessage, Recurrence};
    use crate::store::memory::{MemoryDeliveryStore, MemoryMessageStore, MemorySubscriberStore};

    struct FakeTransport {
        configured: bool,
        failing: Vec<String>,
        sent: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn new() -> Self {
            Self {
                configured: true,
                failing: Vec::new(),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent_to(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn send_text(&self, to: &str, _body: &str) -> Result<String> {
            if self.failing.iter().any(|p| p == to) {
                return Err(Error::Transport {
                    code: 131026,
                    message: "Message undeliverable".to_string(),
                });
            }
            self.sent.lock().unwrap().push(to.to_string());
            Ok(format!("wamid.{to}"))
        }
    }

    struct Harness {
        messages: MemoryMessageStore,
        subscribers: MemorySubscriberStore,
        deliveries: MemoryDeliveryStore,
        transport: Arc<FakeTransport>,
        service: DispatchService,
    }

    fn harness(transport: FakeTransport) -> Harness {
        let messages = MemoryMessageStore::new();
        let subscribers = MemorySubscriberStore::new();
        let deliveries = MemoryDeliveryStore::new();
        let transport = Arc::new(transport);
        let service = DispatchService::new(
            Arc::new(messages.clone()),
            Arc::new(subscribers.clone()),
            Arc::new(deliveries.clone()),
            transport.clone(),
        );
        Harness {
            messages,
            subscribers,
            deliveries,
            transport,
            service,
        }
    }

    async fn draft_message(h: &Harness, contenido: &str) -> Message {
        h.messages
            .insert(NewMessage {
                contenido: contenido.to_string(),
                categoria: MessageCategory::General,
                estado: MessageStatus::Draft,
                programado_para: None,
                recurrencia: Recurrence::None,
                plantilla_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_writes_one_record_per_recipient() {
        let mut transport = FakeTransport::new();
        transport.failing.push("5491100000003".to_string());
        let h = harness(transport);
        h.subscribers.seed("5491100000001", Some("Ana"), true);
        h.subscribers.seed("5491100000002", None, true);
        h.subscribers.seed("5491100000003", None, true);

        let message = draft_message(&h, "Corte de agua el lunes").await;
        let outcome = h.service.dispatch_now(&message).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                enviados: 2,
                fallidos: 1
            }
        );

        let records = h.deliveries.snapshot();
        assert_eq!(records.len(), 3);
        let failed: Vec<_> = records
            .iter()
            .filter(|r| r.estado == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0]
            .error_mensaje
            .as_deref()
            .unwrap()
            .contains("Message undeliverable"));
        assert!(records
            .iter()
            .filter(|r| r.estado == DeliveryStatus::Sent)
            .all(|r| r.whatsapp_message_id.is_some()));

        // Partial delivery is not message-level failure.
        let stored = h.messages.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.estado, MessageStatus::Sent);
        assert!(stored.enviado_en.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn second_dispatch_is_a_noop() {
        let h = harness(FakeTransport::new());
        h.subscribers.seed("5491100000001", None, true);

        let message = draft_message(&h, "hola").await;
        h.service.dispatch_now(&message).await.unwrap();
        let again = h.service.dispatch_now(&message).await.unwrap();

        assert_eq!(again, DispatchOutcome::AlreadyHandled);
        assert_eq!(h.deliveries.snapshot().len(), 1);
        assert_eq!(h.transport.sent_to().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_transport_leaves_message_untouched() {
        let transport = FakeTransport {
            configured: false,
            ..FakeTransport::new()
        };
        let h = harness(transport);
        h.subscribers.seed("5491100000001", None, true);

        let message = draft_message(&h, "hola").await;
        let outcome = h.service.dispatch_now(&message).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::NotConfigured);
        assert!(h.deliveries.snapshot().is_empty());
        let stored = h.messages.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.estado, MessageStatus::Draft);
    }

    #[tokio::test]
    async fn empty_roster_still_marks_sent() {
        let h = harness(FakeTransport::new());
        let message = draft_message(&h, "hola").await;

        let outcome = h.service.dispatch_now(&message).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                enviados: 0,
                fallidos: 0
            }
        );
        assert!(h.deliveries.snapshot().is_empty());
        let stored = h.messages.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.estado, MessageStatus::Sent);
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_subscribers_are_excluded() {
        let h = harness(FakeTransport::new());
        let a = h.subscribers.seed("5491100000001", Some("A"), true);
        let b = h.subscribers.seed("5491100000002", Some("B"), false);

        let message = draft_message(&h, "hola").await;
        h.service.dispatch_now(&message).await.unwrap();

        assert_eq!(h.transport.sent_to(), vec!["5491100000001".to_string()]);
        let records = h.deliveries.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].suscriptor_id, a.id);
        assert!(records.iter().all(|r| r.suscriptor_id != b.id));
    }

    #[tokio::test(start_paused = true)]
    async fn roster_phones_are_normalized_before_sending() {
        let h = harness(FakeTransport::new());
        h.subscribers.seed("+54 11 5555-1234", None, true);

        let message = draft_message(&h, "hola").await;
        h.service.dispatch_now(&message).await.unwrap();

        assert_eq!(h.transport.sent_to(), vec!["5491155551234".to_string()]);
    }

    #[tokio::test]
    async fn roster_failure_surfaces_before_any_state_change() {
        let h = harness(FakeTransport::new());
        h.subscribers.fail_reads(true);

        let message = draft_message(&h, "hola").await;
        let result = h.service.dispatch_now(&message).await;

        assert!(result.is_err());
        let stored = h.messages.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.estado, MessageStatus::Draft);
        assert!(h.deliveries.snapshot().is_empty());
    }
}
