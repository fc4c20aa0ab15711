use lifecycle::{CallbackHandler, InvoiceService};

#[derive(Clone)]
pub struct AppState {
    pub service: InvoiceService,
    pub callbacks: CallbackHandler,
    pub version: String,
}

impl AppState {
    pub fn new(service: InvoiceService, callbacks: CallbackHandler) -> Self {
        Self {
            service,
            callbacks,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
