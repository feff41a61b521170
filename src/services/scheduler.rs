use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::message::{Message, MessageStatus, NewMessage, Recurrence};
use crate::services::dispatch::{DispatchOutcome, DispatchService};
use crate::store::MessageStore;

/// Computes when a recurring message fires next, from its *original*
/// scheduled timestamp so late sweeps never accumulate drift.
///
/// Monthly recurrence uses calendar arithmetic with day-of-month rollover:
/// Jan 31 advances to Mar 2 (or Mar 3 outside leap years), the same behavior
/// the dashboard has always shown. This is intentional, not a clamp-to-
/// month-end.
pub fn next_occurrence(from: DateTime<Utc>, recurrence: Recurrence) -> Option<DateTime<Utc>> {
    match recurrence {
        Recurrence::None => None,
        Recurrence::Daily => Some(from + Duration::days(1)),
        Recurrence::Weekly => Some(from + Duration::days(7)),
        Recurrence::Monthly => Some(add_month_with_rollover(from)),
    }
}

fn add_month_with_rollover(from: DateTime<Utc>) -> DateTime<Utc> {
    let day_offset = i64::from(from.day()) - 1;
    let first_of_month = match from.with_day(1) {
        Some(dt) => dt,
        None => return from + Duration::days(30),
    };
    let next_month = first_of_month
        .checked_add_months(Months::new(1))
        .unwrap_or(first_of_month);
    next_month + Duration::days(day_offset)
}

#[derive(Debug, Serialize)]
pub struct SweepItem {
    pub id: Uuid,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enviados: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallidos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxima_ocurrencia: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub results: Vec<SweepItem>,
}

/// Periodic sweep over due scheduled messages. Externally triggered; each
/// invocation processes at most one batch and runs it to completion.
#[derive(Clone)]
pub struct SchedulerService {
    messages: Arc<dyn MessageStore>,
    dispatch: DispatchService,
    batch_size: i64,
}

impl SchedulerService {
    pub fn new(messages: Arc<dyn MessageStore>, dispatch: DispatchService, batch_size: i64) -> Self {
        Self {
            messages,
            dispatch,
            batch_size,
        }
    }

    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let due = self.messages.due_scheduled(now, self.batch_size).await?;
        if due.is_empty() {
            return Ok(SweepReport {
                processed: 0,
                results: Vec::new(),
            });
        }

        info!(count = due.len(), "processing due scheduled messages");
        let mut results = Vec::with_capacity(due.len());
        for message in due {
            // One message's failure must not abort the sweep.
            results.push(self.process_one(&message).await);
        }

        Ok(SweepReport {
            processed: results.len(),
            results,
        })
    }

    async fn process_one(&self, message: &Message) -> SweepItem {
        match self.dispatch.dispatch_now(message).await {
            Ok(DispatchOutcome::Completed { enviados, fallidos }) => {
                let (proxima, continuation_error) = self.schedule_continuation(message).await;
                SweepItem {
                    id: message.id,
                    status: "sent",
                    enviados: Some(enviados),
                    fallidos: Some(fallidos),
                    proxima_ocurrencia: proxima,
                    error: continuation_error,
                }
            }
            Ok(DispatchOutcome::NotConfigured) => SweepItem {
                id: message.id,
                status: "skipped",
                enviados: None,
                fallidos: None,
                proxima_ocurrencia: None,
                error: Some("WhatsApp not configured".to_string()),
            },
            Ok(DispatchOutcome::AlreadyHandled) => SweepItem {
                id: message.id,
                status: "skipped",
                enviados: None,
                fallidos: None,
                proxima_ocurrencia: None,
                error: None,
            },
            Err(err) => {
                error!(mensaje_id = %message.id, error = %err, "scheduled dispatch failed");
                // Guarded: only flips messages that are still scheduled.
                if let Err(mark_err) = self.messages.mark_failed(message.id).await {
                    error!(mensaje_id = %message.id, error = %mark_err, "could not mark message failed");
                }
                SweepItem {
                    id: message.id,
                    status: "failed",
                    enviados: None,
                    fallidos: None,
                    proxima_ocurrencia: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Recurrence continuation is a fresh scheduled row with the same
    /// content, category and template link, never a mutation of the original.
    async fn schedule_continuation(
        &self,
        message: &Message,
    ) -> (Option<DateTime<Utc>>, Option<String>) {
        let Some(original) = message.programado_para else {
            return (None, None);
        };
        let Some(next_at) = next_occurrence(original, message.recurrencia) else {
            return (None, None);
        };

        let continuation = NewMessage {
            contenido: message.contenido.clone(),
            categoria: message.categoria,
            estado: MessageStatus::Scheduled,
            programado_para: Some(next_at),
            recurrencia: message.recurrencia,
            plantilla_id: message.plantilla_id,
        };
        match self.messages.insert(continuation).await {
            Ok(_) => (Some(next_at), None),
            Err(err) => {
                warn!(mensaje_id = %message.id, error = %err, "failed to schedule recurrence continuation");
                (None, Some(format!("recurrence continuation failed: {err}")))
            }
        }
    }
}
