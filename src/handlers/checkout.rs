use crate::handlers::common::{created_response, map_service_error, validate_input};
use crate::{
    auth::CustomerSession, errors::ApiError, services::checkout::CheckoutInput, AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Places an order from the cart. Card orders also get a hosted payment page.
#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Order placed"),
        (status = 400, description = "Cart, zone, date or promo code rejected", body = crate::errors::ErrorResponse),
        (status = 401, description = "No customer session", body = crate::errors::ErrorResponse),
        (status = 402, description = "Order placed but the payment could not be started", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    security(("cookie" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    session: CustomerSession,
    State(state): State<AppState>,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let result = state
        .services
        .checkout
        .checkout(session.customer_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(result))
}
