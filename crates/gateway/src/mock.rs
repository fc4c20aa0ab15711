use super::{CreatedTransaction, PaymentGateway, PriceOracle, TransactionExtra, VerificationResult};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use trx_broker_core::{BrokerError, InvoiceId, Result};

/// In-process gateway for local runs and tests.
pub struct MockGateway {
    verification: Mutex<VerificationResult>,
    fail_creation: bool,
    latency: Duration,
    created: AtomicUsize,
    verified: AtomicUsize,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            verification: Mutex::new(VerificationResult::Verified),
            fail_creation: false,
            latency: Duration::ZERO,
            created: AtomicUsize::new(0),
            verified: AtomicUsize::new(0),
        }
    }
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A gateway that refuses every creation request.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            fail_creation: true,
            ..Self::default()
        })
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    pub fn set_verification(&self, result: VerificationResult) {
        if let Ok(mut v) = self.verification.lock() {
            *v = result;
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn verified_count(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_transaction(
        &self,
        _fiat_amount: u64,
        invoice_id: InvoiceId,
        _extra: Option<&TransactionExtra>,
    ) -> Result<CreatedTransaction> {
        sleep(self.latency).await;
        if self.fail_creation {
            return Err(BrokerError::Gateway(format!(
                "mock gateway rejected invoice {invoice_id}"
            )));
        }

        let transid: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(CreatedTransaction {
            redirect_url: format!("https://mock.gateway/startpay/{transid}"),
            transaction_ref: transid,
        })
    }

    async fn verify_transaction(
        &self,
        _fiat_amount: u64,
        _transaction_ref: &str,
    ) -> Result<VerificationResult> {
        sleep(self.latency).await;
        self.verified.fetch_add(1, Ordering::SeqCst);
        let result = self
            .verification
            .lock()
            .map(|v| *v)
            .map_err(|_| BrokerError::Gateway("mock gateway state poisoned".to_string()))?;
        Ok(result)
    }
}

/// Oracle that always answers with the configured price, or fails if unset.
#[derive(Default)]
pub struct FixedPriceOracle {
    price: AtomicU64,
}

impl FixedPriceOracle {
    pub fn new(price: u64) -> Arc<Self> {
        Arc::new(Self {
            price: AtomicU64::new(price),
        })
    }

    pub fn set_price(&self, price: u64) {
        self.price.store(price, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn quote(&self) -> Result<u64> {
        match self.price.load(Ordering::SeqCst) {
            0 => Err(BrokerError::UpstreamUnavailable(
                "no fixed price configured".to_string(),
            )),
            price => Ok(price),
        }
    }
}
