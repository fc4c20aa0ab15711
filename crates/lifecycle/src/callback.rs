//! Reconciliation of payment notifications pushed by the gateway.
//!
//! The gateway may deliver the same notification more than once. Only the
//! delivery whose `Pending -> Paid` transition fires retracts the prompt and
//! notifies the owner; every replay reports the same settlement without side
//! effects.

use crate::notifier::{retract_prompt, Notice, Notifier};
use gateway::{PaymentGateway, VerificationResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use store::InvoiceStore;
use trx_broker_core::{BrokerError, InvoiceId, InvoiceStatus, Result};

/// Raw status values sent by the gateway.
pub const STATUS_PAID: &str = "1";
pub const STATUS_ALREADY_PAID: &str = "2";

/// Inbound notification as received (JSON or form). Every field is optional
/// so a missing one can be reported instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
            StringOrNumber::Text(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
            StringOrNumber::Float(f) => f.to_string(),
        }),
    )
}

/// How a callback was settled. None of these are errors from the gateway's
/// point of view; they are all acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Settlement {
    /// Verified at the gateway. Reported on replays too.
    Paid,
    /// The gateway flagged the payment as already settled (`status=2`).
    /// The invoice itself is left untouched.
    AlreadyPaid,
    /// The payment attempt did not go through.
    PaymentFailed,
    /// Verification says the transaction was verified before.
    AlreadyConfirmed,
    /// Verification says the user did not pay.
    NotCompleted,
    UnrecognizedStatus { code: i64 },
}

impl Settlement {
    pub fn message(&self) -> String {
        match self {
            Settlement::Paid => "Your payment was completed successfully.".to_string(),
            Settlement::AlreadyPaid => {
                "This transaction has already been confirmed and paid.".to_string()
            }
            Settlement::PaymentFailed => "The transaction was not completed.".to_string(),
            Settlement::AlreadyConfirmed => {
                "This transaction has already been verified and confirmed.".to_string()
            }
            Settlement::NotCompleted => {
                "The payment was not completed, please try again.".to_string()
            }
            Settlement::UnrecognizedStatus { code } => {
                format!("Unrecognized payment status received: {code}")
            }
        }
    }
}

/// A callback whose required fields are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Notification<'a> {
    invoice_id: &'a str,
    transid: &'a str,
    status: &'a str,
}

impl CallbackPayload {
    fn require(&self) -> Result<Notification<'_>> {
        fn field<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(BrokerError::InvalidCallbackPayload(format!(
                    "missing {name}"
                ))),
            }
        }

        Ok(Notification {
            invoice_id: field(&self.invoice_id, "invoice_id")?,
            transid: field(&self.transid, "transid")?,
            status: self
                .status
                .as_deref()
                .map(str::trim)
                .ok_or_else(|| BrokerError::InvalidCallbackPayload("missing status".to_string()))?,
        })
    }
}

#[derive(Clone)]
pub struct CallbackHandler {
    store: InvoiceStore,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
}

impl CallbackHandler {
    pub fn new(
        store: InvoiceStore,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
        }
    }

    pub async fn handle(&self, payload: &CallbackPayload) -> Result<Settlement> {
        let n = payload.require()?;
        tracing::info!(invoice_id = n.invoice_id, transid = n.transid, status = n.status, "Payment callback received");

        match n.status {
            STATUS_PAID => {}
            STATUS_ALREADY_PAID => return Ok(Settlement::AlreadyPaid),
            _ => return Ok(Settlement::PaymentFailed),
        }

        let id: InvoiceId = n.invoice_id.parse().map_err(|_| {
            BrokerError::InvalidCallbackPayload(format!(
                "invoice_id is not a number: {:?}",
                n.invoice_id
            ))
        })?;
        let invoice = self.store.get(id)?;
        if invoice.external_ref != n.transid {
            tracing::warn!(invoice_id = %id, transid = n.transid, expected = %invoice.external_ref, "Callback transid does not match invoice");
            return Err(BrokerError::InvalidCallbackPayload(format!(
                "transid does not belong to invoice {id}"
            )));
        }

        let verification = self
            .gateway
            .verify_transaction(invoice.fiat_amount, n.transid)
            .await?;

        let settlement = match verification {
            VerificationResult::Verified => {
                self.settle_paid(id).await?;
                Settlement::Paid
            }
            VerificationResult::AlreadyVerified => Settlement::AlreadyConfirmed,
            VerificationResult::NotPaid => Settlement::NotCompleted,
            VerificationResult::Unknown(code) => Settlement::UnrecognizedStatus { code },
        };
        tracing::info!(invoice_id = %id, ?settlement, "Payment callback settled");
        Ok(settlement)
    }

    async fn settle_paid(&self, id: InvoiceId) -> Result<()> {
        match self
            .store
            .try_transition(id, InvoiceStatus::Pending, InvoiceStatus::Paid)
            .await?
        {
            Some(paid) => {
                retract_prompt(self.notifier.as_ref(), &paid).await;
                if let Err(e) = self
                    .notifier
                    .send(paid.owner_id, &Notice::Paid { invoice_id: id })
                    .await
                {
                    tracing::error!(invoice_id = %id, error = %e, "Failed to send payment notice");
                }
            }
            None => match self.store.get(id)?.status {
                InvoiceStatus::Canceled => {
                    tracing::warn!(invoice_id = %id, "Verified payment for an invoice that was already canceled");
                }
                status => {
                    tracing::debug!(invoice_id = %id, %status, "Replayed payment callback ignored");
                }
            },
        }
        Ok(())
    }
}
