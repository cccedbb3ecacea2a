use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AdminSession,
    errors::ApiError,
    services::catalog::{
        CreateFlavorInput, CreateProductInput, ProductFilter, StockAdjustmentInput,
        UpdateFlavorInput, UpdateProductInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct AdminProductQuery {
    pub flavor_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_products(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<AdminProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .list_products(ProductFilter {
            flavor_id: query.flavor_id,
            search: query.search,
            active_only: query.active_only,
        })
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

pub async fn get_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

pub async fn create_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .create_product(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

pub async fn update_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state
        .services
        .catalog
        .update_product(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

pub async fn delete_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Adds, subtracts or replaces the on-hand quantity
pub async fn adjust_stock(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StockAdjustmentInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    tracing::info!(staff_id = %admin.staff_id, product_id = %id, mode = ?payload.mode, "stock adjustment requested");
    let product = state
        .services
        .catalog
        .adjust_stock(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

pub async fn list_flavors(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let flavors = state
        .services
        .catalog
        .list_flavors(false)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(flavors))
}

pub async fn get_flavor(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let flavor = state
        .services
        .catalog
        .get_flavor(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(flavor))
}

pub async fn create_flavor(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateFlavorInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let flavor = state
        .services
        .catalog
        .create_flavor(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(flavor))
}

pub async fn update_flavor(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateFlavorInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let flavor = state
        .services
        .catalog
        .update_flavor(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(flavor))
}

pub async fn delete_flavor(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_flavor(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
