use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AdminSession,
    errors::ApiError,
    services::kitchens::{
        CreateDeliveryManInput, CreateKitchenInput, UpdateDeliveryManInput, UpdateKitchenInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

pub async fn list_kitchens(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let kitchens = state
        .services
        .kitchens
        .list_kitchens()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(kitchens))
}

pub async fn get_kitchen(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let kitchen = state
        .services
        .kitchens
        .get_kitchen(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(kitchen))
}

pub async fn create_kitchen(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateKitchenInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let kitchen = state
        .services
        .kitchens
        .create_kitchen(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(kitchen))
}

pub async fn update_kitchen(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateKitchenInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let kitchen = state
        .services
        .kitchens
        .update_kitchen(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(kitchen))
}

pub async fn delete_kitchen(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .kitchens
        .delete_kitchen(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryManQuery {
    pub kitchen_id: Option<Uuid>,
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_delivery_men(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<DeliveryManQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let couriers = state
        .services
        .kitchens
        .list_delivery_men(query.kitchen_id, query.active_only)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(couriers))
}

pub async fn get_delivery_man(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let courier = state
        .services
        .kitchens
        .get_delivery_man(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(courier))
}

pub async fn create_delivery_man(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateDeliveryManInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let courier = state
        .services
        .kitchens
        .create_delivery_man(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(courier))
}

pub async fn update_delivery_man(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryManInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let courier = state
        .services
        .kitchens
        .update_delivery_man(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(courier))
}

pub async fn delete_delivery_man(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .kitchens
        .delete_delivery_man(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
