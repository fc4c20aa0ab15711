use crate::notifier::{retract_prompt, Notice, Notifier};
use gateway::{PaymentGateway, PriceOracle, TransactionExtra};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use store::{InvoiceDraft, InvoiceStore};
use trx_broker_core::validation::validate_purchase;
use trx_broker_core::{
    price_due, BrokerError, FeeMethod, Invoice, InvoiceId, InvoicePage, InvoiceStatus, OwnerId,
    PriceDue, Result,
};

pub const DEFAULT_PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub owner_id: OwnerId,
    pub crypto_amount: Decimal,
    pub fee_method: FeeMethod,
    pub destination_address: String,
    #[serde(default)]
    pub extra: Option<TransactionExtra>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenedInvoice {
    pub invoice: Invoice,
    pub redirect_url: String,
    pub unit_price: u64,
    pub price_due: PriceDue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    Canceled { invoice: Invoice },
    /// Someone else (payment or expiry) finished the invoice first.
    AlreadyFinal { status: InvoiceStatus },
}

/// Entry points used by the user-facing front-end.
#[derive(Clone)]
pub struct InvoiceService {
    store: InvoiceStore,
    oracle: Arc<dyn PriceOracle>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    page_size: usize,
}

impl InvoiceService {
    pub fn new(
        store: InvoiceStore,
        oracle: Arc<dyn PriceOracle>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            oracle,
            gateway,
            notifier,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn store(&self) -> &InvoiceStore {
        &self.store
    }

    /// Current toman price of one TRX.
    pub async fn quote(&self) -> Result<u64> {
        self.oracle.quote().await
    }

    /// Quote, price, open the gateway transaction and persist the invoice.
    ///
    /// When the gateway refuses, nothing is stored and the error carries the
    /// number that was shown for the attempt.
    pub async fn open_invoice(&self, req: PurchaseRequest) -> Result<OpenedInvoice> {
        let address = req.destination_address.trim().to_string();
        validate_purchase(req.crypto_amount, &address)?;

        let unit_price = self.oracle.quote().await?;
        let due = price_due(req.crypto_amount, unit_price, req.fee_method);

        let reservation = self.store.reserve_id()?;
        let invoice_id = reservation.id();

        let created = match self
            .gateway
            .create_transaction(due.fiat_amount, invoice_id, req.extra.as_ref())
            .await
        {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(invoice_id = %invoice_id, owner_id = req.owner_id, error = %e, "Gateway refused invoice");
                return Err(BrokerError::InvoiceNotIssued {
                    invoice_id,
                    reason: e.to_string(),
                });
            }
        };

        let invoice = self
            .store
            .create_reserved(
                reservation,
                InvoiceDraft {
                    owner_id: req.owner_id,
                    crypto_amount: req.crypto_amount,
                    fee_method: req.fee_method,
                    destination_address: address,
                    fiat_amount: due.fiat_amount,
                    external_ref: created.transaction_ref,
                },
            )
            .await?;

        tracing::info!(invoice_id = %invoice.id, owner_id = invoice.owner_id, unit_price, fiat_amount = due.fiat_amount, "Invoice opened");

        Ok(OpenedInvoice {
            invoice,
            redirect_url: created.redirect_url,
            unit_price,
            price_due: due,
        })
    }

    /// Remembers which prompt shows the invoice so it can be withdrawn later.
    ///
    /// If the invoice already finished, the new prompt is withdrawn right away.
    pub async fn attach_notification(
        &self,
        id: InvoiceId,
        notification_ref: String,
    ) -> Result<Invoice> {
        let invoice = self
            .store
            .set_notification_ref(id, Some(notification_ref))
            .await?;
        if invoice.status.is_terminal() {
            retract_prompt(self.notifier.as_ref(), &invoice).await;
        }
        Ok(invoice)
    }

    /// Explicit cancellation by the invoice owner.
    pub async fn cancel(&self, owner: OwnerId, id: InvoiceId) -> Result<CancelOutcome> {
        let invoice = self.store.get(id)?;
        if invoice.owner_id != owner {
            return Err(BrokerError::NotOwner(id));
        }

        match self
            .store
            .try_transition(id, InvoiceStatus::Pending, InvoiceStatus::Canceled)
            .await?
        {
            Some(canceled) => {
                retract_prompt(self.notifier.as_ref(), &canceled).await;
                if let Err(e) = self
                    .notifier
                    .send(owner, &Notice::Canceled { invoice_id: id })
                    .await
                {
                    tracing::error!(invoice_id = %id, error = %e, "Failed to send cancellation notice");
                }
                Ok(CancelOutcome::Canceled { invoice: canceled })
            }
            None => {
                let status = self.store.get(id)?.status;
                tracing::info!(invoice_id = %id, status = %status, "Cancel lost the race");
                Ok(CancelOutcome::AlreadyFinal { status })
            }
        }
    }

    pub fn get(&self, id: InvoiceId) -> Result<Invoice> {
        self.store.get(id)
    }

    /// Page `page` (zero-based) of the owner's invoices, newest first.
    pub fn history(&self, owner: OwnerId, page: usize) -> Result<InvoicePage> {
        self.store.page_by_owner(owner, page, self.page_size)
    }
}
