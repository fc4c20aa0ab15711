use super::PriceOracle;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use trx_broker_core::{BrokerError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.nobitex.ir";

/// Rial per toman. The feed quotes in rial, invoices are in toman.
pub const RIAL_PER_TOMAN: u64 = 10;

/// Price oracle backed by the Nobitex market-stats endpoint.
#[derive(Clone)]
pub struct NobitexOracle {
    pub base_url: String,
    http_client: reqwest::Client,
}

impl NobitexOracle {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }))
    }

    async fn fetch(&self) -> anyhow::Result<u64> {
        let url = format!("{}/market/stats", self.base_url);
        let resp = self
            .http_client
            .get(&url)
            .query(&[("srcCurrency", "trx"), ("dstCurrency", "rls")])
            .send()
            .await
            .context("Failed to query market stats")?;

        if !resp.status().is_success() {
            bail!("market stats returned {}", resp.status());
        }

        let body: Value = resp
            .json()
            .await
            .context("Failed to parse market stats")?;

        let price = parse_best_buy(&body)? / RIAL_PER_TOMAN;
        if price == 0 {
            bail!("market stats returned a zero price");
        }
        Ok(price)
    }
}

fn parse_best_buy(body: &Value) -> anyhow::Result<u64> {
    let raw = body
        .pointer("/stats/trx-rls/bestBuy")
        .ok_or_else(|| anyhow!("bestBuy missing from market stats"))?;

    match raw {
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .with_context(|| format!("bestBuy is not an integer: {s:?}")),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| anyhow!("bestBuy is not a positive integer: {n}")),
        other => bail!("unexpected bestBuy value: {other}"),
    }
}

#[async_trait]
impl PriceOracle for NobitexOracle {
    async fn quote(&self) -> Result<u64> {
        match self.fetch().await {
            Ok(price) => Ok(price),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Error fetching TRX price");
                Err(BrokerError::UpstreamUnavailable(format!("{e:#}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn best_buy_accepts_string_and_number() {
        let body = json!({"stats": {"trx-rls": {"bestBuy": "85000"}}});
        assert_eq!(parse_best_buy(&body).unwrap(), 85_000);

        let body = json!({"stats": {"trx-rls": {"bestBuy": 85009}}});
        assert_eq!(parse_best_buy(&body).unwrap(), 85_009);
    }

    #[test]
    fn malformed_best_buy_is_rejected() {
        assert!(parse_best_buy(&json!({"stats": {}})).is_err());
        assert!(parse_best_buy(&json!({"stats": {"trx-rls": {"bestBuy": "8.5e4"}}})).is_err());
        assert!(parse_best_buy(&json!({"stats": {"trx-rls": {"bestBuy": -1}}})).is_err());
    }
}
