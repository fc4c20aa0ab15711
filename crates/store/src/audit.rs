use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use trx_broker_core::{Invoice, InvoiceId, InvoiceStatus, OwnerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: String,
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub owner_id: Option<OwnerId>,
    pub external_ref: Option<String>,
    pub fiat_amount: Option<u64>,
}

impl AuditEvent {
    pub fn new(event_type: &str, invoice_id: InvoiceId, status: InvoiceStatus) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            invoice_id,
            status,
            owner_id: None,
            external_ref: None,
            fiat_amount: None,
        }
    }

    pub fn for_invoice(event_type: &str, invoice: &Invoice) -> Self {
        Self::new(event_type, invoice.id, invoice.status)
            .with_owner(invoice.owner_id)
            .with_external_ref(invoice.external_ref.clone())
            .with_fiat_amount(invoice.fiat_amount)
    }

    pub fn with_owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_external_ref(mut self, external_ref: String) -> Self {
        self.external_ref = Some(external_ref);
        self
    }

    pub fn with_fiat_amount(mut self, fiat_amount: u64) -> Self {
        self.fiat_amount = Some(fiat_amount);
        self
    }
}

/// Append-only JSONL trail of invoice lifecycle events. Disabled when no path is set.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Audit failures never fail the operation that produced the event.
    pub fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!(event_type = %event.event_type, invoice_id = %event.invoice_id, error = %e, "Failed to write audit event");
        }
    }

    fn write(&self, event: &AuditEvent) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        tracing::debug!(event_type = %event.event_type, invoice_id = %event.invoice_id, "Audit event written");
        Ok(())
    }
}
