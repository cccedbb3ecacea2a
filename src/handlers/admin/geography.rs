use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AdminSession,
    errors::ApiError,
    services::delivery::{
        CreateCityInput, CreateDeliveryRuleInput, CreateZoneInput, UpdateCityInput,
        UpdateDeliveryRuleInput, UpdateZoneInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

// Cities

pub async fn list_cities(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let cities = state
        .services
        .delivery
        .list_cities(false)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cities))
}

pub async fn get_city(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let city = state
        .services
        .delivery
        .get_city(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(city))
}

pub async fn create_city(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateCityInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let city = state
        .services
        .delivery
        .create_city(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(city))
}

pub async fn update_city(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCityInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let city = state
        .services
        .delivery
        .update_city(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(city))
}

/// Refused with 409 while the city still has zones
pub async fn delete_city(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .delivery
        .delete_city(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

// Zones

#[derive(Debug, Default, Deserialize)]
pub struct ZoneQuery {
    pub city_id: Option<Uuid>,
}

pub async fn list_zones(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ZoneQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let zones = state
        .services
        .delivery
        .list_zones(query.city_id, false)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(zones))
}

pub async fn get_zone(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let zone = state
        .services
        .delivery
        .get_zone(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(zone))
}

pub async fn create_zone(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateZoneInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let zone = state
        .services
        .delivery
        .create_zone(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(zone))
}

pub async fn update_zone(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateZoneInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let zone = state
        .services
        .delivery
        .update_zone(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(zone))
}

pub async fn delete_zone(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .delivery
        .delete_zone(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

// Delivery rules

pub async fn list_rules(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let rules = state
        .services
        .delivery
        .list_rules()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(rules))
}

pub async fn get_rule(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state
        .services
        .delivery
        .get_rule(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(rule))
}

pub async fn create_rule(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateDeliveryRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let rule = state
        .services
        .delivery
        .create_rule(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(rule))
}

pub async fn update_rule(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRuleInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let rule = state
        .services
        .delivery
        .update_rule(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(rule))
}

pub async fn delete_rule(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .delivery
        .delete_rule(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
