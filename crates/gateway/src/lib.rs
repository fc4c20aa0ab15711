use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trx_broker_core::{InvoiceId, Result};

/// A transaction opened at the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTransaction {
    /// Where the user is sent to pay.
    pub redirect_url: String,
    /// Gateway-side transaction id (`transid`).
    pub transaction_ref: String,
}

/// Optional fields forwarded to the gateway when opening a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExtra {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationResult {
    Verified,
    AlreadyVerified,
    NotPaid,
    Unknown(i64),
}

impl VerificationResult {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => VerificationResult::Verified,
            2 => VerificationResult::AlreadyVerified,
            0 => VerificationResult::NotPaid,
            other => VerificationResult::Unknown(other),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        fiat_amount: u64,
        invoice_id: InvoiceId,
        extra: Option<&TransactionExtra>,
    ) -> Result<CreatedTransaction>;

    async fn verify_transaction(
        &self,
        fiat_amount: u64,
        transaction_ref: &str,
    ) -> Result<VerificationResult>;
}

/// Source of the current toman price of one TRX.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn quote(&self) -> Result<u64>;
}

pub mod aqayepardakht;
pub mod mock;
pub mod nobitex;
