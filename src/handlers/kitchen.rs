//! Kitchen panel. Kitchen staff only see their own kitchen; admins see all of them.

use crate::handlers::common::{map_service_error, success_response};
use crate::{
    auth::KitchenSession,
    errors::ApiError,
    services::orders::{AssignDeliveryManInput, UpdateOrderStatusInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

pub fn kitchen_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/{id}/status", put(update_status))
        .route("/orders/{id}/delivery-man", put(assign_delivery_man))
        .route("/delivery-men", get(list_delivery_men))
}

#[derive(Debug, Default, Deserialize)]
pub struct KitchenOrdersQuery {
    pub date: Option<NaiveDate>,
}

pub async fn list_orders(
    session: KitchenSession,
    State(state): State<AppState>,
    Query(query): Query<KitchenOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .kitchen_queue(session.scope(), query.date)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

pub async fn update_status(
    session: KitchenSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .kitchen_update_status(session.scope(), id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

pub async fn assign_delivery_man(
    session: KitchenSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDeliveryManInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .assign_delivery_man(session.scope(), id, payload.delivery_man_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

pub async fn list_delivery_men(
    session: KitchenSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let couriers = state
        .services
        .kitchens
        .list_delivery_men(session.scope(), true)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(couriers))
}
