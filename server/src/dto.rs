use lifecycle::{CancelOutcome, OpenedInvoice, Settlement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trx_broker_core::{FeeMethod, InvoiceId, InvoiceStatus, OwnerId};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    /// Toman per TRX, before markup.
    pub unit_price: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenInvoiceRequest {
    pub owner_id: OwnerId,
    pub crypto_amount: Decimal,
    pub fee_method: FeeMethod,
    pub destination_address: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenInvoiceResponse {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub fiat_amount: u64,
    pub delivered_crypto: Decimal,
    pub unit_price: u64,
    pub redirect_url: String,
}

impl From<OpenedInvoice> for OpenInvoiceResponse {
    fn from(opened: OpenedInvoice) -> Self {
        Self {
            invoice_id: opened.invoice.id,
            status: opened.invoice.status,
            fiat_amount: opened.price_due.fiat_amount,
            delivered_crypto: opened.price_due.delivered_crypto,
            unit_price: opened.unit_price,
            redirect_url: opened.redirect_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachNotificationRequest {
    pub notification_ref: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRequest {
    pub owner_id: OwnerId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub canceled: bool,
    pub status: InvoiceStatus,
}

impl From<CancelOutcome> for CancelResponse {
    fn from(outcome: CancelOutcome) -> Self {
        match outcome {
            CancelOutcome::Canceled { invoice } => Self {
                canceled: true,
                status: invoice.status,
            },
            CancelOutcome::AlreadyFinal { status } => Self {
                canceled: false,
                status,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub page: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub settlement: Settlement,
    pub message: String,
}

impl From<Settlement> for CallbackResponse {
    fn from(settlement: Settlement) -> Self {
        Self {
            message: settlement.message(),
            settlement,
        }
    }
}
