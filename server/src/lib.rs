//! HTTP surface of the TRX broker.
//!
//! ## Endpoints
//! - GET /health
//! - GET /price - current toman price of one TRX
//! - POST /invoices - open an invoice
//! - GET /invoices/:id
//! - POST /invoices/:id/notification - record the payment prompt handle
//! - POST /invoices/:id/cancel - owner cancellation
//! - GET /owners/:owner/invoices?page=N - paged history
//! - POST /callback - gateway payment notification (JSON or form)

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
