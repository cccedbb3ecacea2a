use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    Page, PageQuery,
};
use crate::{
    auth::AdminSession,
    errors::ApiError,
    services::staff::{CreateStaffInput, UpdateStaffInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerSearch {
    pub search: Option<String>,
}

pub async fn list_customers(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(search): Query<CustomerSearch>,
    Query(paging): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = paging.resolve(&state.config);
    let (customers, total) = state
        .services
        .customers
        .list_customers(search.search, request.page, request.per_page)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(Page::new(customers, request, total)))
}

pub async fn get_customer(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(customer))
}

// Staff accounts

pub async fn list_staff(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let staff = state
        .services
        .staff
        .list_staff()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(staff))
}

pub async fn get_staff(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let staff = state
        .services
        .staff
        .get_staff(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(staff))
}

pub async fn create_staff(
    _admin: AdminSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateStaffInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let staff = state
        .services
        .staff
        .create_staff(payload)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(staff))
}

pub async fn update_staff(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStaffInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let staff = state
        .services
        .staff
        .update_staff(id, admin.staff_id, payload)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(staff))
}

pub async fn delete_staff(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .staff
        .delete_staff(id, admin.staff_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
