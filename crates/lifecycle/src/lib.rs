//! Invoice lifecycle: opening, user cancellation, payment callbacks and
//! expiry. Every terminal state change goes through
//! [`store::InvoiceStore::transition`], so the three actors can race freely.

pub mod callback;
pub mod notifier;
pub mod service;
pub mod sweeper;

pub use callback::{CallbackHandler, CallbackPayload, Settlement};
pub use notifier::{LogNotifier, Notice, Notifier, NotifierEvent, RecordingNotifier};
pub use service::{CancelOutcome, InvoiceService, OpenedInvoice, PurchaseRequest};
pub use sweeper::{SweepReport, Sweeper, SweeperConfig};
