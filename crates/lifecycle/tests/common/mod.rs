#![allow(dead_code)]

use gateway::mock::{FixedPriceOracle, MockGateway};
use lifecycle::{
    CallbackHandler, CallbackPayload, InvoiceService, PurchaseRequest, RecordingNotifier, Sweeper,
    SweeperConfig,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use store::InvoiceStore;
use trx_broker_core::{FeeMethod, Invoice, OwnerId};

pub const ADDRESS: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";
pub const UNIT_PRICE: u64 = 8_500;

pub struct Harness {
    pub store: InvoiceStore,
    pub gateway: Arc<MockGateway>,
    pub oracle: Arc<FixedPriceOracle>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: InvoiceService,
    pub callbacks: CallbackHandler,
    pub sweeper: Sweeper,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(MockGateway::new())
    }

    pub fn with_gateway(gateway: Arc<MockGateway>) -> Self {
        Self::build(gateway, SweeperConfig::default())
    }

    pub fn build(gateway: Arc<MockGateway>, config: SweeperConfig) -> Self {
        let store = InvoiceStore::temporary().unwrap();
        let oracle = FixedPriceOracle::new(UNIT_PRICE);
        let notifier = Arc::new(RecordingNotifier::new());

        let service = InvoiceService::new(
            store.clone(),
            oracle.clone(),
            gateway.clone(),
            notifier.clone(),
        );
        let callbacks = CallbackHandler::new(store.clone(), gateway.clone(), notifier.clone());
        let sweeper = Sweeper::new(store.clone(), notifier.clone(), config);

        Self {
            store,
            gateway,
            oracle,
            notifier,
            service,
            callbacks,
            sweeper,
        }
    }

    pub async fn open(&self, owner: OwnerId, amount: Decimal, fee_method: FeeMethod) -> Invoice {
        self.service
            .open_invoice(PurchaseRequest {
                owner_id: owner,
                crypto_amount: amount,
                fee_method,
                destination_address: ADDRESS.to_string(),
                extra: None,
            })
            .await
            .unwrap()
            .invoice
    }

    /// Opens an invoice and attaches a payment prompt to it.
    pub async fn open_with_prompt(&self, owner: OwnerId, prompt: &str) -> Invoice {
        let invoice = self
            .open(owner, Decimal::from(10), FeeMethod::FlatFiatFee)
            .await;
        self.service
            .attach_notification(invoice.id, prompt.to_string())
            .await
            .unwrap()
    }
}

pub fn paid_callback(invoice: &Invoice) -> CallbackPayload {
    callback(invoice, "1")
}

pub fn callback(invoice: &Invoice, status: &str) -> CallbackPayload {
    CallbackPayload {
        invoice_id: Some(invoice.id.to_string()),
        transid: Some(invoice.external_ref.clone()),
        status: Some(status.to_string()),
    }
}
