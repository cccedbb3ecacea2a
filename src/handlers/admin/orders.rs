use crate::handlers::common::{map_service_error, success_response, Page, PageQuery};
use crate::{
    auth::AdminSession,
    errors::ApiError,
    services::orders::{
        AssignDeliveryManInput, OrderFilter, UpdateOrderStatusInput, UpdatePaymentStatusInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

pub async fn list_orders(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
    Query(paging): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = paging.resolve(&state.config);
    let (orders, total) = state
        .services
        .orders
        .list_orders(filter, request.page, request.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(Page::new(orders, request, total)))
}

pub async fn get_order(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

pub async fn update_status(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

pub async fn assign_delivery_man(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDeliveryManInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .assign_delivery_man(None, id, payload.delivery_man_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

pub async fn update_payment_status(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .set_payment_status(id, payload.payment_status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub date: Option<NaiveDate>,
}

/// Defaults to today in the business timezone
pub async fn dashboard(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = query
        .date
        .unwrap_or_else(|| state.services.delivery.now_local().date());
    let summary = state
        .services
        .orders
        .dashboard(date)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}

pub async fn cleanup_carts(
    admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let abandoned = state
        .services
        .cart
        .abandon_expired(Utc::now())
        .await
        .map_err(map_service_error)?;
    let purged_cache_entries = state.cache.purge_expired();
    info!(staff_id = %admin.staff_id, abandoned, purged_cache_entries, "manual cleanup");
    Ok(success_response(json!({
        "abandoned": abandoned,
        "purged_cache_entries": purged_cache_entries,
    })))
}
