use crate::models::InvoiceId;
use thiserror::Error;

/// Failure taxonomy shared by every crate in the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Price feed unreachable, slow or malformed. The user may retry.
    #[error("price feed unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Creation or verification call to the payment gateway failed.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("invalid callback payload: {0}")]
    InvalidCallbackPayload(String),

    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),

    #[error("persistence error: {0}")]
    Persistence(String),

    /// Purchase request rejected before anything was reserved.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The gateway refused to open a transaction. No record exists for
    /// `invoice_id`; the number is only reported back to the user.
    #[error("invoice {invoice_id} was not issued: {reason}")]
    InvoiceNotIssued { invoice_id: InvoiceId, reason: String },

    #[error("invoice {0} belongs to another user")]
    NotOwner(InvoiceId),
}

impl BrokerError {
    pub fn persistence<E: std::fmt::Display>(err: E) -> Self {
        BrokerError::Persistence(err.to_string())
    }

    /// Errors the user can resolve by simply trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::UpstreamUnavailable(_)
                | BrokerError::Gateway(_)
                | BrokerError::InvoiceNotIssued { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
