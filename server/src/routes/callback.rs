//! Payment notifications pushed by the gateway.
//!
//! The gateway posts either JSON or an urlencoded form. Any other media type
//! is refused before the payload is looked at.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap},
    Json,
};
use lifecycle::CallbackPayload;
use trx_broker_core::BrokerError;

use crate::dto::CallbackResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<CallbackResponse>> {
    let payload = parse_payload(&headers, &body)?;
    let settlement = state.callbacks.handle(&payload).await?;
    Ok(Json(settlement.into()))
}

fn parse_payload(headers: &HeaderMap, body: &[u8]) -> ApiResult<CallbackPayload> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let invalid = |e: String| ApiError::from(BrokerError::InvalidCallbackPayload(e));
    match mime.as_str() {
        "application/json" => serde_json::from_slice(body).map_err(|e| invalid(e.to_string())),
        "application/x-www-form-urlencoded" => {
            serde_urlencoded::from_bytes(body).map_err(|e| invalid(e.to_string()))
        }
        _ => Err(ApiError::UnsupportedMediaType(if content_type.is_empty() {
            "missing content type".to_string()
        } else {
            content_type.to_string()
        })),
    }
}
