use anyhow::{Context, Result};
use config::AppConfig;
use gateway::{
    aqayepardakht::{self, AqayepardakhtClient},
    mock::{FixedPriceOracle, MockGateway},
    nobitex::{self, NobitexOracle},
    PaymentGateway, PriceOracle,
};
use lifecycle::{CallbackHandler, InvoiceService, LogNotifier, Notifier, Sweeper, SweeperConfig};
use std::sync::Arc;
use std::time::Duration;
use store::{AuditLog, InvoiceStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trx_broker_server::{create_router, AppState};

fn init_tracing() {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn create_payment_gateway(cfg: &AppConfig) -> Result<Arc<dyn PaymentGateway>> {
    match cfg.gateway.kind.as_str() {
        "aqayepardakht" => {
            let base_url = cfg
                .gateway
                .base_url
                .clone()
                .unwrap_or_else(|| aqayepardakht::DEFAULT_BASE_URL.to_string());
            let pin = config::gateway_pin();
            let client = AqayepardakhtClient::new(
                base_url,
                pin,
                cfg.gateway.callback_url.clone(),
                cfg.gateway.timeout(),
            )?;
            tracing::info!(sandbox = client.is_sandbox(), "Using Aqayepardakht gateway");
            Ok(client)
        }
        _ => {
            tracing::info!("Using mock payment gateway");
            Ok(MockGateway::new())
        }
    }
}

fn create_price_oracle(cfg: &AppConfig) -> Result<Arc<dyn PriceOracle>> {
    match cfg.price_feed.kind.as_str() {
        "nobitex" => {
            let base_url = cfg
                .price_feed
                .base_url
                .clone()
                .unwrap_or_else(|| nobitex::DEFAULT_BASE_URL.to_string());
            tracing::info!(base_url = %base_url, "Using Nobitex price feed");
            Ok(NobitexOracle::new(base_url, cfg.price_feed.timeout())?)
        }
        _ => {
            tracing::info!(price = cfg.price_feed.fixed_price, "Using fixed price feed");
            Ok(FixedPriceOracle::new(cfg.price_feed.fixed_price))
        }
    }
}

fn open_store(cfg: &AppConfig) -> Result<InvoiceStore> {
    let audit = match &cfg.store.audit_log {
        Some(path) => AuditLog::at(path.clone()),
        None => AuditLog::disabled(),
    };
    let store = InvoiceStore::open(&cfg.store.path)
        .with_context(|| format!("Failed to open invoice store at {}", cfg.store.path.display()))?
        .with_audit_log(audit);
    tracing::info!(path = %cfg.store.path.display(), invoices = store.len(), "Invoice store opened");
    Ok(store)
}

/// Handles `set-pin <PIN>` and `clear-pin`. Returns true when a command ran.
fn run_admin_command(args: &[String]) -> Result<bool> {
    match args.first().map(String::as_str) {
        Some("set-pin") => {
            let pin = args
                .get(1)
                .context("Usage: trx-broker set-pin <PIN>")?;
            config::store_secret(config::GATEWAY_PIN_KEY, pin)
                .context("Failed to store gateway PIN in keychain")?;
            tracing::info!("Gateway PIN stored in keychain");
            Ok(true)
        }
        Some("clear-pin") => {
            config::delete_secret(config::GATEWAY_PIN_KEY)
                .context("Failed to remove gateway PIN from keychain")?;
            tracing::info!("Gateway PIN removed from keychain");
            Ok(true)
        }
        _ => Ok(false),
    }
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown requested");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if run_admin_command(&args)? {
        return Ok(());
    }

    let cfg = config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default config");
        AppConfig::default()
    });

    let store = open_store(&cfg)?;
    let gateway = create_payment_gateway(&cfg)?;
    let oracle = create_price_oracle(&cfg)?;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let service = InvoiceService::new(store.clone(), oracle, gateway.clone(), notifier.clone())
        .with_page_size(cfg.history.page_size);
    let callbacks = CallbackHandler::new(store.clone(), gateway, notifier.clone());

    let shutdown = CancellationToken::new();
    let sweeper = Sweeper::new(
        store,
        notifier,
        SweeperConfig {
            interval: Duration::from_secs(cfg.sweeper.interval_secs.max(1)),
            expiry: chrono::Duration::minutes(cfg.sweeper.expiry_minutes),
        },
    )
    .spawn(shutdown.clone());

    let router = create_router(AppState::new(service, callbacks));
    let listener = TcpListener::bind(cfg.server.bind_addr.as_str())
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind_addr))?;
    tracing::info!(addr = %cfg.server.bind_addr, "TRX broker listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Expiration sweeper task failed");
    }
    tracing::info!("TRX broker stopped");
    Ok(())
}
