use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "trx-broker";
const KEYCHAIN_SERVICE: &str = "trx.broker.credentials";

/// Points at an explicit config file instead of the per-user confy location.
pub const CONFIG_PATH_ENV: &str = "TRX_BROKER_CONFIG";
pub const GATEWAY_PIN_ENV: &str = "AQAYEPARDAKHT_PIN";
pub const GATEWAY_PIN_KEY: &str = "gateway_pin";
pub const SANDBOX_PIN: &str = "sandbox";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub price_feed: PriceFeedConfig,
    #[serde(default)]
    pub sweeper: SweeperSettings,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// JSONL audit trail; disabled when unset.
    pub audit_log: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".trx_broker_db"),
            audit_log: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub kind: String, // "mock" | "aqayepardakht"
    pub base_url: Option<String>,
    pub callback_url: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: "mock".to_string(),
            base_url: None,
            callback_url: "http://127.0.0.1:5000/callback".to_string(),
            timeout_secs: 15,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceFeedConfig {
    pub kind: String, // "fixed" | "nobitex"
    pub base_url: Option<String>,
    /// Toman per TRX answered by the `fixed` feed.
    pub fixed_price: u64,
    pub timeout_secs: u64,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            kind: "fixed".to_string(),
            base_url: None,
            fixed_price: 8_500,
            timeout_secs: 10,
        }
    }
}

impl PriceFeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperSettings {
    pub interval_secs: u64,
    pub expiry_minutes: i64,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            expiry_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub page_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { page_size: 6 }
    }
}

/// Loads the config from `TRX_BROKER_CONFIG` if set, else from the confy
/// default location. A missing file is created with defaults.
pub fn load() -> Result<AppConfig> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => load_from(PathBuf::from(path)),
        None => confy::load(APP_NAME, None).context("Failed to load app config"),
    }
}

pub fn load_from(path: impl Into<PathBuf>) -> Result<AppConfig> {
    let path = path.into();
    confy::load_path(&path)
        .with_context(|| format!("Failed to load app config from {}", path.display()))
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

/// The merchant PIN for the payment gateway.
pub fn gateway_pin() -> String {
    let from_env = std::env::var(GATEWAY_PIN_ENV).ok();
    let from_keychain = match from_env {
        Some(_) => None,
        None => get_secret(GATEWAY_PIN_KEY).ok(),
    };
    resolve_pin(from_env, from_keychain)
}

fn resolve_pin(from_env: Option<String>, from_keychain: Option<String>) -> String {
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    if let Some(pin) = non_empty(from_env) {
        return pin;
    }
    if let Some(pin) = non_empty(from_keychain) {
        return pin;
    }
    tracing::warn!("No gateway PIN configured, falling back to the sandbox PIN");
    SANDBOX_PIN.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:5000");
        assert_eq!(cfg.store.path, PathBuf::from(".trx_broker_db"));
        assert_eq!(cfg.gateway.kind, "mock");
        assert_eq!(cfg.gateway.timeout(), Duration::from_secs(15));
        assert_eq!(cfg.price_feed.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.sweeper.interval_secs, 60);
        assert_eq!(cfg.sweeper.expiry_minutes, 15);
        assert_eq!(cfg.history.page_size, 6);
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.toml");

        let cfg = load_from(&path).unwrap();

        assert_eq!(cfg, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.toml");
        std::fs::write(
            &path,
            "[gateway]\nkind = \"aqayepardakht\"\ntimeout_secs = 5\n\n[sweeper]\nexpiry_minutes = 30\n",
        )
        .unwrap();

        let cfg = load_from(&path).unwrap();

        assert_eq!(cfg.gateway.kind, "aqayepardakht");
        assert_eq!(cfg.gateway.timeout_secs, 5);
        assert_eq!(cfg.gateway.callback_url, GatewayConfig::default().callback_url);
        assert_eq!(cfg.sweeper.expiry_minutes, 30);
        assert_eq!(cfg.sweeper.interval_secs, 60);
        assert_eq!(cfg.price_feed, PriceFeedConfig::default());
    }

    #[test]
    fn pin_prefers_env_then_keychain_then_sandbox() {
        assert_eq!(
            resolve_pin(Some("env-pin".into()), Some("kc-pin".into())),
            "env-pin"
        );
        assert_eq!(resolve_pin(Some("  ".into()), Some("kc-pin".into())), "kc-pin");
        assert_eq!(resolve_pin(None, None), SANDBOX_PIN);
    }
}
