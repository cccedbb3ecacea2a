use crate::{
    errors::ServiceError,
    services::payments::{
        verify_webhook_signature, PaymentWebhookEvent, SIGNATURE_HEADER, TIMESTAMP_HEADER,
    },
    AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use tracing::warn;

pub fn payment_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// POST /api/payments/webhook
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = PaymentWebhookEvent,
    responses(
        (status = 200, description = "Webhook applied"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown payment reference", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let Some(secret) = state.config.payment.webhook_secret.as_deref() else {
        warn!("payment webhook received but no webhook secret is configured");
        return Err(ServiceError::ServiceUnavailable(
            "payment webhooks are not configured".to_string(),
        ));
    };

    let (Some(timestamp), Some(signature)) = (
        header(&headers, TIMESTAMP_HEADER),
        header(&headers, SIGNATURE_HEADER),
    ) else {
        warn!("payment webhook without signature headers");
        return Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    };

    verify_webhook_signature(
        secret,
        timestamp,
        signature,
        &body,
        state.config.payment.webhook_tolerance_secs,
    )
    .inspect_err(|_| warn!("payment webhook signature verification failed"))?;

    let event: PaymentWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::InvalidInput(format!("invalid webhook body: {}", e)))?;

    let order = state.services.payments.apply_webhook(event).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "order_number": order.order_number,
            "payment_status": order.payment_status,
        })),
    ))
}
