//! In-memory store implementations backing the test suite, mirroring the
//! semantics of the Postgres stores (state-guarded updates, upsert by phone,
//! conflict-tolerant ledger inserts).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::delivery_record::{DeliveryRecord, DeliveryStatus, NewDeliveryRecord};
use crate::models::message::{Message, MessageStatus, NewMessage};
use crate::models::subscriber::Subscriber;
use crate::store::{DeliveryStore, MessageStore, SubscriberStore};

fn simulated_failure() -> Error {
    Error::Internal("simulated store failure".to_string())
}

#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    inner: Arc<Mutex<Vec<Message>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.lock().expect("lock poisoned").clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.inner.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, new: NewMessage) -> Result<Message> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            contenido: new.contenido,
            categoria: new.categoria,
            estado: new.estado,
            programado_para: new.programado_para,
            enviado_en: None,
            recurrencia: new.recurrencia,
            plantilla_id: new.plantilla_id,
            created_at: now,
            updated_at: now,
        };
        self.lock().push(message.clone());
        Ok(message)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.lock().iter().find(|m| m.id == id).cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Message>> {
        let mut messages = self.lock().clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Message>> {
        let mut due: Vec<Message> = self
            .lock()
            .iter()
            .filter(|m| {
                m.estado == MessageStatus::Scheduled
                    && m.programado_para.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|m| m.programado_para);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let mut messages = self.lock();
        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        if !message.estado.can_transition_to(MessageStatus::Sent) {
            return Ok(false);
        }
        message.estado = MessageStatus::Sent;
        message.enviado_en = Some(sent_at);
        message.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_failed(&self, id: Uuid) -> Result<bool> {
        let mut messages = self.lock();
        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return Ok(false);
        };
        if message.estado != MessageStatus::Scheduled {
            return Ok(false);
        }
        message.estado = MessageStatus::Failed;
        message.updated_at = Utc::now();
        Ok(true)
    }
}

#[derive(Clone, Default)]
pub struct MemorySubscriberStore {
    inner: Arc<Mutex<Vec<Subscriber>>>,
    fail_reads: Arc<AtomicBool>,
}

impl MemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.inner.lock().expect("lock poisoned").clone()
    }

    /// Seeds a subscriber row directly, bypassing the opt-in path.
    pub fn seed(&self, telefono: &str, nombre: Option<&str>, activo: bool) -> Subscriber {
        let now = Utc::now();
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            telefono: telefono.to_string(),
            nombre: nombre.map(str::to_string),
            activo,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .expect("lock poisoned")
            .push(subscriber.clone());
        subscriber
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.inner.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn upsert_active(&self, telefono: &str, nombre: Option<&str>) -> Result<Subscriber> {
        let mut subscribers = self.lock();
        if let Some(existing) = subscribers.iter_mut().find(|s| s.telefono == telefono) {
            existing.activo = true;
            if nombre.is_some() {
                existing.nombre = nombre.map(str::to_string);
            }
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            telefono: telefono.to_string(),
            nombre: nombre.map(str::to_string),
            activo: true,
            created_at: now,
            updated_at: now,
        };
        subscribers.push(subscriber.clone());
        Ok(subscriber)
    }

    async fn deactivate(&self, telefono: &str) -> Result<bool> {
        let mut subscribers = self.lock();
        let Some(existing) = subscribers.iter_mut().find(|s| s.telefono == telefono) else {
            return Ok(false);
        };
        existing.activo = false;
        existing.updated_at = Utc::now();
        Ok(true)
    }

    async fn active(&self) -> Result<Vec<Subscriber>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        Ok(self.lock().iter().filter(|s| s.activo).cloned().collect())
    }

    async fn list(&self) -> Result<Vec<Subscriber>> {
        Ok(self.lock().clone())
    }
}

#[derive(Clone, Default)]
pub struct MemoryDeliveryStore {
    inner: Arc<Mutex<Vec<DeliveryRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<DeliveryRecord> {
        self.inner.lock().expect("lock poisoned").clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeliveryRecord>> {
        self.inner.lock().expect("lock poisoned")
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn insert_many(&self, records: Vec<NewDeliveryRecord>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(simulated_failure());
        }
        let mut stored = self.lock();
        for record in records {
            let exists = stored
                .iter()
                .any(|r| r.mensaje_id == record.mensaje_id && r.suscriptor_id == record.suscriptor_id);
            if exists {
                continue;
            }
            let now = Utc::now();
            stored.push(DeliveryRecord {
                id: Uuid::new_v4(),
                mensaje_id: record.mensaje_id,
                suscriptor_id: record.suscriptor_id,
                estado: record.estado,
                whatsapp_message_id: record.whatsapp_message_id,
                whatsapp_status: None,
                error_mensaje: record.error_mensaje,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(())
    }

    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<DeliveryRecord>> {
        Ok(self
            .lock()
            .iter()
            .find(|r| r.whatsapp_message_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        estado: DeliveryStatus,
        provider_status: &str,
        error_mensaje: Option<&str>,
    ) -> Result<()> {
        let mut records = self.lock();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.estado = estado;
            record.whatsapp_status = Some(provider_status.to_string());
            if let Some(detail) = error_mensaje {
                record.error_mensaje = Some(detail.to_string());
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn for_message(&self, mensaje_id: Uuid) -> Result<Vec<DeliveryRecord>> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| r.mensaje_id == mensaje_id)
            .cloned()
            .collect())
    }
}
