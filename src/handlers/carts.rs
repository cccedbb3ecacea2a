use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    auth::OptionalCustomerSession,
    errors::ApiError,
    services::cart::{
        AddCartItemInput, ApplyPromoInput, CartView, CreateCartInput, UpdateCartItemInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/{id}", get(get_cart))
        .route("/{id}/items", post(add_item))
        .route("/{id}/items/{item_id}", put(update_item).delete(remove_item))
        .route("/{id}/clear", post(clear_cart))
        .route("/{id}/promo", post(apply_promo).delete(remove_promo))
}

fn customer_id(session: OptionalCustomerSession) -> Option<Uuid> {
    session.0.map(|s| s.customer_id)
}

/// Opens a cart, or returns the session's open one
#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = CreateCartInput,
    responses((status = 201, description = "Cart", body = CartView)),
    tag = "Cart"
)]
pub async fn create_cart(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateCartInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .get_or_create_for_session(payload.session_id, customer_id(session))
        .await
        .map_err(map_service_error)?;

    Ok(created_response(cart))
}

#[utoipa::path(
    get,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart with lines and totals", body = CartView),
        (status = 404, description = "Unknown cart", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get_cart(id, customer_id(session))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = AddCartItemInput,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 400, description = "Cart is closed or input invalid", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn add_item(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCartItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .add_item(id, customer_id(session), payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    put,
    path = "/api/cart/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart line ID")
    ),
    request_body = UpdateCartItemInput,
    responses((status = 200, description = "Updated cart", body = CartView)),
    tag = "Cart"
)]
pub async fn update_item(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCartItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .update_item(id, item_id, customer_id(session), payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}/items/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart line ID")
    ),
    responses((status = 200, description = "Updated cart", body = CartView)),
    tag = "Cart"
)]
pub async fn remove_item(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .remove_item(id, item_id, customer_id(session))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/clear",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses((status = 200, description = "Emptied cart", body = CartView)),
    tag = "Cart"
)]
pub async fn clear_cart(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .clear(id, customer_id(session))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/promo",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = ApplyPromoInput,
    responses(
        (status = 200, description = "Code stored on the cart", body = CartView),
        (status = 400, description = "Code does not apply", body = crate::errors::ErrorResponse)
    ),
    tag = "Cart"
)]
pub async fn apply_promo(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApplyPromoInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .apply_promo(id, customer_id(session), payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}/promo",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses((status = 200, description = "Code removed", body = CartView)),
    tag = "Cart"
)]
pub async fn remove_promo(
    session: OptionalCustomerSession,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .remove_promo(id, customer_id(session))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}
