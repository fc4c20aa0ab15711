//! API route handlers

pub mod callback;
pub mod health;
pub mod invoices;

use axum::{routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/price", get(invoices::current_price))
        // Invoices
        .route("/invoices", post(invoices::open_invoice))
        .route("/invoices/:invoice_id", get(invoices::get_invoice))
        .route(
            "/invoices/:invoice_id/notification",
            post(invoices::attach_notification),
        )
        .route("/invoices/:invoice_id/cancel", post(invoices::cancel_invoice))
        .route("/owners/:owner_id/invoices", get(invoices::owner_history))
        // Gateway
        .route("/callback", post(callback::payment_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
