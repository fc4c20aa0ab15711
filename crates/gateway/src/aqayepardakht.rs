use super::{CreatedTransaction, PaymentGateway, TransactionExtra, VerificationResult};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use trx_broker_core::{BrokerError, InvoiceId, Result};

pub const DEFAULT_BASE_URL: &str = "https://panel.aqayepardakht.ir";
pub const SANDBOX_PIN: &str = "sandbox";

/// Reported when the verify response carries no usable `code`.
pub const UNPARSABLE_CODE: i64 = -99;

/// Client for the Aqayepardakht v2 payment API.
#[derive(Clone)]
pub struct AqayepardakhtClient {
    pub base_url: String,
    pub callback_url: String,
    pin: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    pin: &'a str,
    amount: u64,
    callback: &'a str,
    invoice_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    card_number: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    pin: &'a str,
    amount: u64,
    transid: &'a str,
}

impl AqayepardakhtClient {
    pub fn new(
        base_url: String,
        pin: String,
        callback_url: String,
        timeout: Duration,
    ) -> anyhow::Result<Arc<Self>> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            callback_url,
            pin,
            http_client,
        }))
    }

    pub fn is_sandbox(&self) -> bool {
        self.pin == SANDBOX_PIN
    }

    fn redirect_url(&self, transid: &str) -> String {
        if self.is_sandbox() {
            format!("{}/startpay/sandbox/{}", self.base_url, transid)
        } else {
            format!("{}/startpay/{}", self.base_url, transid)
        }
    }

    async fn create(
        &self,
        fiat_amount: u64,
        invoice_id: InvoiceId,
        extra: Option<&TransactionExtra>,
    ) -> anyhow::Result<CreatedTransaction> {
        let create_url = format!("{}/api/v2/create", self.base_url);
        let payload = CreateRequest {
            pin: &self.pin,
            amount: fiat_amount,
            callback: &self.callback_url,
            invoice_id: invoice_id.to_string(),
            description: extra.and_then(|e| e.description.as_deref()),
            mobile: extra.and_then(|e| e.mobile.as_deref()),
            card_number: extra.and_then(|e| e.card_number.as_deref()),
        };

        let resp = self
            .http_client
            .post(&create_url)
            .form(&payload)
            .send()
            .await
            .context("Failed to send create request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("create failed: {} - {}", status, body);
        }

        let body: Value = resp
            .json()
            .await
            .context("Failed to parse create response")?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
        if status != "success" {
            bail!("create rejected with status {:?}: {}", status, body);
        }

        let transid = match body.get("transid") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(anyhow!("create response has no transid: {}", body)),
        };

        tracing::info!(invoice_id = %invoice_id, transid = %transid, "Gateway transaction created");

        Ok(CreatedTransaction {
            redirect_url: self.redirect_url(&transid),
            transaction_ref: transid,
        })
    }

    async fn verify(&self, fiat_amount: u64, transid: &str) -> anyhow::Result<VerificationResult> {
        let verify_url = format!("{}/api/v2/verify", self.base_url);
        let payload = VerifyRequest {
            pin: &self.pin,
            amount: fiat_amount,
            transid,
        };

        let resp = self
            .http_client
            .post(&verify_url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send verify request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("verify failed: {} - {}", status, body);
        }

        let body: Value = resp
            .json()
            .await
            .context("Failed to parse verify response")?;

        let code = parse_code(body.get("code"));
        tracing::debug!(transid = %transid, code, "Gateway verification answered");
        Ok(VerificationResult::from_code(code))
    }
}

/// The gateway sends `code` as either a number or a numeric string.
fn parse_code(raw: Option<&Value>) -> i64 {
    match raw {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(UNPARSABLE_CODE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(UNPARSABLE_CODE),
        _ => UNPARSABLE_CODE,
    }
}

#[async_trait]
impl PaymentGateway for AqayepardakhtClient {
    async fn create_transaction(
        &self,
        fiat_amount: u64,
        invoice_id: InvoiceId,
        extra: Option<&TransactionExtra>,
    ) -> Result<CreatedTransaction> {
        self.create(fiat_amount, invoice_id, extra)
            .await
            .map_err(|e| BrokerError::Gateway(format!("{e:#}")))
    }

    async fn verify_transaction(
        &self,
        fiat_amount: u64,
        transaction_ref: &str,
    ) -> Result<VerificationResult> {
        self.verify(fiat_amount, transaction_ref)
            .await
            .map_err(|e| BrokerError::Gateway(format!("{e:#}")))
    }
}
