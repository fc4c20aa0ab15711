mod audit;

pub use audit::{AuditEvent, AuditLog};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sled::{Db, IVec, Tree};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::{Arc, Mutex};
use trx_broker_core::{
    BrokerError, FeeMethod, Invoice, InvoiceId, InvoicePage, InvoiceStatus, OwnerId, Result,
};

const INVOICES_TREE: &str = "invoices";

/// Where invoice numbers are drawn from, and how hard to try before widening.
#[derive(Debug, Clone)]
pub struct IdSpace {
    pub primary: RangeInclusive<u64>,
    pub fallback: RangeInclusive<u64>,
    pub attempts: usize,
}

impl Default for IdSpace {
    fn default() -> Self {
        Self {
            primary: 10_000_000..=99_999_999,
            fallback: 1_000_000_000..=9_999_999_999,
            attempts: 32,
        }
    }
}

/// Everything the creation flow knows about an invoice before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub owner_id: OwnerId,
    pub crypto_amount: Decimal,
    pub fee_method: FeeMethod,
    pub destination_address: String,
    pub fiat_amount: u64,
    pub external_ref: String,
}

/// An invoice number held for an in-flight creation.
///
/// No other reservation in this process can receive the same number while
/// it is alive. Dropping it releases the number; nothing is persisted.
#[derive(Debug)]
pub struct Reservation {
    id: InvoiceId,
    reserved: Arc<Mutex<HashSet<InvoiceId>>>,
}

impl Reservation {
    pub fn id(&self) -> InvoiceId {
        self.id
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Ok(mut reserved) = self.reserved.lock() {
            reserved.remove(&self.id);
        }
    }
}

/// Sled-backed invoice store. Records are JSON values keyed by the
/// big-endian invoice number.
#[derive(Clone)]
pub struct InvoiceStore {
    db: Db,
    invoices: Tree,
    reserved: Arc<Mutex<HashSet<InvoiceId>>>,
    id_space: IdSpace,
    audit: AuditLog,
    #[cfg(test)]
    fail_flush: Arc<std::sync::atomic::AtomicBool>,
}

impl InvoiceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(BrokerError::persistence)?;
        Self::from_db(db)
    }

    /// A store that lives only as long as the process.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(BrokerError::persistence)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let invoices = db.open_tree(INVOICES_TREE).map_err(BrokerError::persistence)?;
        Ok(Self {
            db,
            invoices,
            reserved: Arc::new(Mutex::new(HashSet::new())),
            id_space: IdSpace::default(),
            audit: AuditLog::disabled(),
            #[cfg(test)]
            fail_flush: Arc::default(),
        })
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_id_space(mut self, id_space: IdSpace) -> Self {
        self.id_space = id_space;
        self
    }

    /// Picks an invoice number that is neither stored nor reserved.
    pub fn reserve_id(&self) -> Result<Reservation> {
        let mut reserved = self
            .reserved
            .lock()
            .map_err(|_| BrokerError::Persistence("reservation table poisoned".to_string()))?;
        let mut rng = rand::thread_rng();

        for range in [&self.id_space.primary, &self.id_space.fallback] {
            for _ in 0..self.id_space.attempts {
                let id = InvoiceId(rng.gen_range(range.clone()));
                if reserved.contains(&id) || self.contains(id)? {
                    tracing::debug!(invoice_id = %id, "Invoice number collision, regenerating");
                    continue;
                }
                reserved.insert(id);
                return Ok(Reservation {
                    id,
                    reserved: Arc::clone(&self.reserved),
                });
            }
            tracing::warn!(
                start = *range.start(),
                end = *range.end(),
                "Invoice number range exhausted after {} attempts",
                self.id_space.attempts
            );
        }

        Err(BrokerError::Persistence(
            "invoice number space exhausted".to_string(),
        ))
    }

    /// Reserves a number and persists the draft under it.
    pub async fn create(&self, draft: InvoiceDraft) -> Result<Invoice> {
        let reservation = self.reserve_id()?;
        self.create_reserved(reservation, draft).await
    }

    /// Persists a Pending invoice under a previously reserved number.
    pub async fn create_reserved(
        &self,
        reservation: Reservation,
        draft: InvoiceDraft,
    ) -> Result<Invoice> {
        let invoice = Invoice {
            id: reservation.id(),
            external_ref: draft.external_ref,
            fiat_amount: draft.fiat_amount,
            crypto_amount: draft.crypto_amount,
            fee_method: draft.fee_method,
            destination_address: draft.destination_address,
            owner_id: draft.owner_id,
            status: InvoiceStatus::Pending,
            notification_ref: None,
            created_at: Utc::now(),
        };

        let inserted = self
            .invoices
            .compare_and_swap(invoice.id.to_key(), None::<&[u8]>, Some(encode(&invoice)?))
            .map_err(BrokerError::persistence)?;
        if inserted.is_err() {
            return Err(BrokerError::Persistence(format!(
                "invoice {} already exists",
                invoice.id
            )));
        }
        drop(reservation);
        self.flush_committed(invoice.id).await;

        self.audit
            .record(&AuditEvent::for_invoice("invoice_opened", &invoice));
        tracing::info!(invoice_id = %invoice.id, owner_id = invoice.owner_id, fiat_amount = invoice.fiat_amount, "Invoice stored");
        Ok(invoice)
    }

    /// Moves `id` from `from` to `to` if and only if it is currently `from`.
    ///
    /// Returns false, without touching the record, when another actor got
    /// there first.
    pub async fn transition(
        &self,
        id: InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<bool> {
        Ok(self.try_transition(id, from, to).await?.is_some())
    }

    /// Like [`InvoiceStore::transition`], returning the updated record when it fired.
    pub async fn try_transition(
        &self,
        id: InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>> {
        if from != InvoiceStatus::Pending || to == InvoiceStatus::Pending {
            return Err(BrokerError::InvalidRequest(format!(
                "illegal transition {from} -> {to}"
            )));
        }

        let updated = self.update_if(id, |invoice| {
            if invoice.status != from {
                return false;
            }
            invoice.status = to;
            true
        })?;

        if let Some(invoice) = &updated {
            self.flush_committed(id).await;
            let event_type = match to {
                InvoiceStatus::Paid => "invoice_paid",
                _ => "invoice_canceled",
            };
            self.audit.record(&AuditEvent::for_invoice(event_type, invoice));
            tracing::info!(invoice_id = %id, status = %to, "Invoice transitioned");
        }
        Ok(updated)
    }

    /// Records the handle of the payment prompt shown for `id`.
    pub async fn set_notification_ref(
        &self,
        id: InvoiceId,
        notification_ref: Option<String>,
    ) -> Result<Invoice> {
        let updated = self.update_if(id, |invoice| {
            invoice.notification_ref = notification_ref.clone();
            true
        })?;
        if updated.is_some() {
            self.flush_committed(id).await;
        }
        updated.ok_or(BrokerError::InvoiceNotFound(id))
    }

    pub fn get(&self, id: InvoiceId) -> Result<Invoice> {
        let bytes = self
            .invoices
            .get(id.to_key())
            .map_err(BrokerError::persistence)?
            .ok_or(BrokerError::InvoiceNotFound(id))?;
        decode(&bytes)
    }

    pub fn contains(&self, id: InvoiceId) -> Result<bool> {
        self.invoices
            .contains_key(id.to_key())
            .map_err(BrokerError::persistence)
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }

    /// All invoices of `owner`, newest first.
    pub fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Invoice>> {
        let mut out: Vec<Invoice> = self
            .all()?
            .into_iter()
            .filter(|inv| inv.owner_id == owner)
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    /// Page `page` (zero-based) of [`InvoiceStore::list_by_owner`].
    pub fn page_by_owner(&self, owner: OwnerId, page: usize, page_size: usize) -> Result<InvoicePage> {
        let page_size = page_size.max(1);
        let all = self.list_by_owner(owner)?;
        let total = all.len();
        let start = page.saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);

        Ok(InvoicePage {
            items: all[start..end].to_vec(),
            page,
            total,
            has_previous: page > 0,
            has_next: end < total,
        })
    }

    /// Pending invoices created at least `threshold` ago, oldest first.
    pub fn find_stale_pending(&self, threshold: Duration) -> Result<Vec<Invoice>> {
        self.find_stale_pending_as_of(Utc::now(), threshold)
    }

    pub fn find_stale_pending_as_of(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<Vec<Invoice>> {
        let cutoff = now - threshold;
        let mut out: Vec<Invoice> = self
            .all()?
            .into_iter()
            .filter(|inv| inv.status == InvoiceStatus::Pending && inv.created_at <= cutoff)
            .collect();
        out.sort_by_key(|inv| inv.created_at);
        Ok(out)
    }

    fn all(&self) -> Result<Vec<Invoice>> {
        let mut out = Vec::new();
        for item in self.invoices.iter() {
            let (_k, v) = item.map_err(BrokerError::persistence)?;
            out.push(decode(&v)?);
        }
        Ok(out)
    }

    /// Compare-and-swap loop over a single record. `f` returns false to leave
    /// the record untouched.
    fn update_if<F>(&self, id: InvoiceId, mut f: F) -> Result<Option<Invoice>>
    where
        F: FnMut(&mut Invoice) -> bool,
    {
        let key = id.to_key();
        loop {
            let current = self
                .invoices
                .get(key)
                .map_err(BrokerError::persistence)?
                .ok_or(BrokerError::InvoiceNotFound(id))?;
            let mut invoice = decode(&current)?;
            if !f(&mut invoice) {
                return Ok(None);
            }

            let swapped = self
                .invoices
                .compare_and_swap(key, Some(&current), Some(encode(&invoice)?))
                .map_err(BrokerError::persistence)?;
            match swapped {
                Ok(()) => return Ok(Some(invoice)),
                Err(_) => {
                    tracing::debug!(invoice_id = %id, "Concurrent update, retrying");
                }
            }
        }
    }

    #[cfg(test)]
    fn flush_disabled(&self) -> bool {
        self.fail_flush.load(std::sync::atomic::Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn flush_disabled(&self) -> bool {
        false
    }

    /// Flushes after a write that has already landed in the tree. The write
    /// stands either way, so callers still see it and run their side effects.
    async fn flush_committed(&self, id: InvoiceId) {
        if let Err(e) = self.flush().await {
            tracing::error!(invoice_id = %id, error = %e, "Failed to flush committed invoice write");
        }
    }

    async fn flush(&self) -> Result<()> {
        if self.flush_disabled() {
            return Err(BrokerError::Persistence("disk unavailable".to_string()));
        }
        self.db
            .flush_async()
            .await
            .map(|_| ())
            .map_err(BrokerError::persistence)
    }
}

fn encode(invoice: &Invoice) -> Result<Vec<u8>> {
    serde_json::to_vec(invoice).map_err(BrokerError::persistence)
}

fn decode(bytes: &IVec) -> Result<Invoice> {
    serde_json::from_slice(bytes).map_err(BrokerError::persistence)
}
