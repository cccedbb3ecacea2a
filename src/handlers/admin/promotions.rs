use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AdminSession,
    errors::ApiError,
    services::promotions::{CreatePromoCodeInput, UpdatePromoCodeInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

pub async fn list_codes(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let codes = state
        .services
        .promotions
        .list_codes()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(codes))
}

pub async fn get_code(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let code = state
        .services
        .promotions
        .get_code(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(code))
}

pub async fn create_code(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreatePromoCodeInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let code = state
        .services
        .promotions
        .create_code(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(code))
}

pub async fn update_code(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePromoCodeInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let code = state
        .services
        .promotions
        .update_code(id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(code))
}

pub async fn delete_code(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .promotions
        .delete_code(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
