use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric invoice number shown to the user and sent to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub u64);

impl InvoiceId {
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvoiceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(InvoiceId)
    }
}

/// Identifier of the user (chat) that requested the purchase.
pub type OwnerId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Canceled,
}

impl InvoiceStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, InvoiceStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the network transfer fee is covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMethod {
    /// Fee is added to the toman charge; the full quantity is delivered.
    FlatFiatFee,
    /// Fee is taken out of the delivered TRX quantity.
    DeductedFromCrypto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub external_ref: String,
    pub fiat_amount: u64,
    pub crypto_amount: Decimal,
    pub fee_method: FeeMethod,
    pub destination_address: String,
    pub owner_id: OwnerId,
    pub status: InvoiceStatus,
    pub notification_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One page of an owner's invoice history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePage {
    pub items: Vec<Invoice>,
    pub page: usize,
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&InvoiceStatus::Canceled).unwrap();
        assert_eq!(json, "\"canceled\"");
        assert!(InvoiceStatus::Paid.is_terminal());
        assert!(!InvoiceStatus::Pending.is_terminal());
    }

    #[test]
    fn invoice_id_parses_with_whitespace() {
        let id: InvoiceId = " 12345678 ".parse().unwrap();
        assert_eq!(id, InvoiceId(12_345_678));
        assert!("abc".parse::<InvoiceId>().is_err());
    }

    #[test]
    fn invoice_keys_sort_numerically() {
        assert!(InvoiceId(10_000_001).to_key() > InvoiceId(10_000_000).to_key());
    }
}
