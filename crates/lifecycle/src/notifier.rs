use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use trx_broker_core::{Invoice, InvoiceId, OwnerId};

/// What the owner is told when an invoice reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Paid { invoice_id: InvoiceId },
    Canceled { invoice_id: InvoiceId },
    Expired { invoice_id: InvoiceId, after_minutes: i64 },
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Notice::Paid { invoice_id } => {
                format!("Payment for order {invoice_id} was received. Your TRX is on its way.")
            }
            Notice::Canceled { invoice_id } => format!("Your order {invoice_id} has been canceled."),
            Notice::Expired {
                invoice_id,
                after_minutes,
            } => format!(
                "Your order {invoice_id} was canceled because the invoice was not paid within {after_minutes} minutes."
            ),
        }
    }
}

/// Outbound channel to the user. Implemented by the chat front-end.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Withdraws the payment prompt identified by `notification_ref`.
    async fn retract(&self, owner: OwnerId, notification_ref: &str) -> Result<()>;
    async fn send(&self, owner: OwnerId, notice: &Notice) -> Result<()>;
}

/// Retracts the invoice's payment prompt, if it has one. Failures are logged only.
pub(crate) async fn retract_prompt(notifier: &dyn Notifier, invoice: &Invoice) {
    let Some(notification_ref) = invoice.notification_ref.as_deref() else {
        tracing::debug!(invoice_id = %invoice.id, "No payment prompt to retract");
        return;
    };
    if let Err(e) = notifier.retract(invoice.owner_id, notification_ref).await {
        tracing::error!(invoice_id = %invoice.id, owner_id = invoice.owner_id, error = %e, "Failed to retract payment prompt");
    }
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn retract(&self, owner: OwnerId, notification_ref: &str) -> Result<()> {
        tracing::info!(owner_id = owner, notification_ref, "Retracting payment prompt");
        Ok(())
    }

    async fn send(&self, owner: OwnerId, notice: &Notice) -> Result<()> {
        tracing::info!(owner_id = owner, notice = %notice.text(), "Notifying owner");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Retracted { owner: OwnerId, notification_ref: String },
    Sent { owner: OwnerId, notice: Notice },
}

/// Keeps every call for later inspection; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
    fail_retractions: AtomicBool,
    fail_sends: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_retractions(&self, fail: bool) {
        self.fail_retractions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn retractions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, NotifierEvent::Retracted { .. }))
            .count()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NotifierEvent::Sent { notice, .. } => Some(notice),
                NotifierEvent::Retracted { .. } => None,
            })
            .collect()
    }

    fn push(&self, event: NotifierEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("recording notifier poisoned"))?
            .push(event);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn retract(&self, owner: OwnerId, notification_ref: &str) -> Result<()> {
        if self.fail_retractions.load(Ordering::SeqCst) {
            return Err(anyhow!("message {notification_ref} can no longer be deleted"));
        }
        self.push(NotifierEvent::Retracted {
            owner,
            notification_ref: notification_ref.to_string(),
        })
    }

    async fn send(&self, owner: OwnerId, notice: &Notice) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("chat {owner} is unreachable"));
        }
        self.push(NotifierEvent::Sent {
            owner,
            notice: notice.clone(),
        })
    }
}
