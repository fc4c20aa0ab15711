pub mod error;
pub mod models;
pub mod pricing;
pub mod validation;

pub use error::{BrokerError, Result};
pub use models::{FeeMethod, Invoice, InvoiceId, InvoicePage, InvoiceStatus, OwnerId};
pub use pricing::{price_due, PriceDue};
