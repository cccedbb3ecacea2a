//! Public catalog and delivery endpoints. Nothing here needs a session.

use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::{catalog::ProductFilter, delivery::DeliveryDates, promotions::PromoOutcome},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub fn storefront_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/flavors", get(list_flavors))
        .route("/cities", get(list_cities))
        .route("/cities/{id}/zones", get(list_city_zones))
        .route("/delivery/dates", get(delivery_dates))
        .route("/promo/validate", post(validate_promo))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub flavor_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidatePromoRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[schema(value_type = String, example = "25.00")]
    pub subtotal: Decimal,
}

/// Active products, optionally narrowed by flavor or name
#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses((status = 200, description = "Active products")),
    tag = "Storefront"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .list_products(ProductFilter {
            flavor_id: query.flavor_id,
            search: query.search,
            active_only: true,
        })
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product"),
        (status = 404, description = "Unknown or inactive product", body = crate::errors::ErrorResponse)
    ),
    tag = "Storefront"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_active_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

#[utoipa::path(
    get,
    path = "/api/flavors",
    responses((status = 200, description = "Active flavors")),
    tag = "Storefront"
)]
pub async fn list_flavors(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let flavors = state
        .services
        .catalog
        .list_flavors(true)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(flavors))
}

#[utoipa::path(
    get,
    path = "/api/cities",
    responses((status = 200, description = "Cities currently delivered to")),
    tag = "Storefront"
)]
pub async fn list_cities(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cities = state
        .services
        .delivery
        .list_cities(true)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cities))
}

#[utoipa::path(
    get,
    path = "/api/cities/{id}/zones",
    params(("id" = Uuid, Path, description = "City ID")),
    responses(
        (status = 200, description = "Active zones of the city"),
        (status = 404, description = "Unknown or inactive city", body = crate::errors::ErrorResponse)
    ),
    tag = "Storefront"
)]
pub async fn list_city_zones(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let zones = state
        .services
        .delivery
        .list_city_zones(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(zones))
}

/// Dates a new order can be delivered on, given the active delivery rule
#[utoipa::path(
    get,
    path = "/api/delivery/dates",
    responses((status = 200, description = "Selectable delivery dates", body = DeliveryDates)),
    tag = "Storefront"
)]
pub async fn delivery_dates(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let dates = state
        .services
        .delivery
        .available_dates()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(dates))
}

#[utoipa::path(
    post,
    path = "/api/promo/validate",
    request_body = ValidatePromoRequest,
    responses(
        (status = 200, description = "Code applies", body = PromoOutcome),
        (status = 400, description = "Code does not apply", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown code", body = crate::errors::ErrorResponse)
    ),
    tag = "Storefront"
)]
pub async fn validate_promo(
    State(state): State<AppState>,
    Json(payload): Json<ValidatePromoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    if payload.subtotal < Decimal::ZERO {
        return Err(ApiError::ValidationError(
            "subtotal cannot be negative".to_string(),
        ));
    }

    let outcome = state
        .services
        .promotions
        .validate_code(&payload.code, payload.subtotal)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(outcome))
}
