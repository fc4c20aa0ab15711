//! Invoice endpoints used by the user-facing front-end

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use gateway::TransactionExtra;
use lifecycle::PurchaseRequest;
use trx_broker_core::{Invoice, InvoiceId, InvoicePage, OwnerId};

use crate::dto::{
    AttachNotificationRequest, CancelRequest, CancelResponse, HistoryQuery,
    OpenInvoiceRequest, OpenInvoiceResponse, PriceResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn parse_invoice_id(raw: &str) -> ApiResult<InvoiceId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid invoice id: {raw}")))
}

pub async fn current_price(State(state): State<AppState>) -> ApiResult<Json<PriceResponse>> {
    let unit_price = state.service.quote().await?;
    Ok(Json(PriceResponse { unit_price }))
}

pub async fn open_invoice(
    State(state): State<AppState>,
    Json(req): Json<OpenInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<OpenInvoiceResponse>)> {
    let extra = match (&req.description, &req.mobile, &req.card_number) {
        (None, None, None) => None,
        _ => Some(TransactionExtra {
            description: req.description,
            mobile: req.mobile,
            card_number: req.card_number,
        }),
    };

    let opened = state
        .service
        .open_invoice(PurchaseRequest {
            owner_id: req.owner_id,
            crypto_amount: req.crypto_amount,
            fee_method: req.fee_method,
            destination_address: req.destination_address,
            extra,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(opened.into())))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    let id = parse_invoice_id(&invoice_id)?;
    Ok(Json(state.service.get(id)?))
}

pub async fn attach_notification(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(req): Json<AttachNotificationRequest>,
) -> ApiResult<Json<Invoice>> {
    let id = parse_invoice_id(&invoice_id)?;
    if req.notification_ref.trim().is_empty() {
        return Err(ApiError::BadRequest("notification_ref is empty".to_string()));
    }
    let invoice = state
        .service
        .attach_notification(id, req.notification_ref)
        .await?;
    Ok(Json(invoice))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<CancelResponse>> {
    let id = parse_invoice_id(&invoice_id)?;
    let outcome = state.service.cancel(req.owner_id, id).await?;
    Ok(Json(outcome.into()))
}

pub async fn owner_history(
    State(state): State<AppState>,
    Path(owner_id): Path<OwnerId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<InvoicePage>> {
    Ok(Json(state.service.history(owner_id, query.page)?))
}
