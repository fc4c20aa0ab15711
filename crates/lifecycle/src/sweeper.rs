use crate::notifier::{retract_prompt, Notice, Notifier};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use store::InvoiceStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use trx_broker_core::{Invoice, InvoiceStatus};

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// Age after which a Pending invoice is canceled.
    pub expiry: chrono::Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            expiry: chrono::Duration::minutes(15),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub visited: usize,
    pub canceled: usize,
    /// Already finished by a callback or the user before the sweep got there.
    pub skipped: usize,
    pub failed: usize,
}

/// Background task that cancels invoices left unpaid past the expiry.
#[derive(Clone)]
pub struct Sweeper {
    store: InvoiceStore,
    notifier: Arc<dyn Notifier>,
    config: SweeperConfig,
}

impl Sweeper {
    pub fn new(store: InvoiceStore, notifier: Arc<dyn Notifier>, config: SweeperConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Sweeps immediately, then once per interval until `shutdown` fires.
    /// A cycle that has started always runs to completion.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.config.interval.as_secs(), expiry_minutes = self.config.expiry.num_minutes(), "Expiration sweeper started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report.visited > 0 {
                        tracing::info!(?report, "Sweep cycle finished");
                    }
                }
            }
        }

        tracing::info!("Expiration sweeper stopped");
    }

    pub async fn sweep_once(&self) -> SweepReport {
        self.sweep_as_of(Utc::now()).await
    }

    pub async fn sweep_as_of(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        let stale = match self.store.find_stale_pending_as_of(now, self.config.expiry) {
            Ok(stale) => stale,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query stale invoices");
                report.failed += 1;
                return report;
            }
        };

        for invoice in stale {
            report.visited += 1;
            match self.expire(&invoice).await {
                Ok(true) => report.canceled += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(invoice_id = %invoice.id, error = %e, "Failed to expire invoice");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn expire(&self, invoice: &Invoice) -> trx_broker_core::Result<bool> {
        let Some(canceled) = self
            .store
            .try_transition(invoice.id, InvoiceStatus::Pending, InvoiceStatus::Canceled)
            .await?
        else {
            tracing::debug!(invoice_id = %invoice.id, "Invoice finished concurrently, skipping");
            return Ok(false);
        };

        retract_prompt(self.notifier.as_ref(), &canceled).await;
        let notice = Notice::Expired {
            invoice_id: canceled.id,
            after_minutes: self.config.expiry.num_minutes(),
        };
        if let Err(e) = self.notifier.send(canceled.owner_id, &notice).await {
            tracing::error!(invoice_id = %canceled.id, owner_id = canceled.owner_id, error = %e, "Failed to send expiry notice");
        }
        tracing::info!(invoice_id = %canceled.id, "Invoice expired");
        Ok(true)
    }
}
