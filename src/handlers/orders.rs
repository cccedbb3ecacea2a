//! A customer's own orders

use crate::handlers::common::{map_service_error, success_response};
use crate::{auth::CustomerSession, errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/{order_number}", get(get_my_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "Orders of the signed-in customer, newest first"),
        (status = 401, description = "No customer session", body = crate::errors::ErrorResponse)
    ),
    security(("cookie" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    session: CustomerSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_for_customer(session.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/{order_number}",
    params(("order_number" = String, Path, description = "Order number, e.g. CK-20250303-X7K2QP")),
    responses(
        (status = 200, description = "Order with its lines"),
        (status = 404, description = "No such order for this customer", body = crate::errors::ErrorResponse)
    ),
    security(("cookie" = [])),
    tag = "Orders"
)]
pub async fn get_my_order(
    session: CustomerSession,
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_for_customer(session.customer_id, &order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
