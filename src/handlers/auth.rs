//! Customer OTP login and staff password login. Both hand out a JWT in an HttpOnly
//! cookie and echo the token in the body for API clients.

use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::{
        clear_cookie, session_cookie, CustomerSession, SessionRole, CUSTOMER_COOKIE,
        STAFF_COOKIE,
    },
    entities::{CustomerModel, StaffUserModel},
    errors::{ApiError, ServiceError},
    services::{customers::UpdateProfileInput, otp::OtpRequested},
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub fn customer_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/otp/request", post(request_otp))
        .route("/otp/verify", post(verify_otp))
        .route("/logout", post(logout))
        .route("/me", get(me).put(update_me))
}

pub fn staff_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(staff_login))
        .route("/logout", post(staff_logout))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OtpRequest {
    #[validate(length(min = 7, max = 32))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OtpVerifyRequest {
    #[validate(length(min = 7, max = 32))]
    pub phone: String,
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StaffLoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CustomerSessionResponse {
    pub token: String,
    pub expires_in: i64,
    pub customer: CustomerModel,
}

#[derive(Debug, Serialize)]
pub struct StaffSessionResponse {
    pub token: String,
    pub expires_in: i64,
    pub staff: StaffUserModel,
}

fn issue_error(e: crate::auth::AuthError) -> ApiError {
    map_service_error(ServiceError::from(e))
}

/// Sends a login code by SMS
#[utoipa::path(
    post,
    path = "/api/auth/otp/request",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code sent", body = OtpRequested),
        (status = 400, description = "Invalid phone number", body = crate::errors::ErrorResponse),
        (status = 429, description = "Too many codes requested", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let requested = state
        .services
        .otp
        .request_code(&payload.phone)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(requested))
}

/// Exchanges a valid code for a customer session
#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set"),
        (status = 401, description = "Wrong or expired code", body = crate::errors::ErrorResponse),
        (status = 429, description = "Too many wrong attempts", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<OtpVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .otp
        .verify_code(&payload.phone, &payload.code)
        .await
        .map_err(map_service_error)?;

    let token = state
        .tokens
        .issue(customer.id, SessionRole::Customer, None)
        .map_err(issue_error)?;
    let expires_in = state.tokens.ttl_secs(SessionRole::Customer);
    let jar = jar.add(session_cookie(
        CUSTOMER_COOKIE,
        token.clone(),
        expires_in,
        state.config.cookie_secure,
    ));

    Ok((
        jar,
        success_response(CustomerSessionResponse {
            token,
            expires_in,
            customer,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Session cookie cleared")),
    tag = "Auth"
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_cookie(CUSTOMER_COOKIE, state.config.cookie_secure)),
        axum::http::StatusCode::NO_CONTENT,
    )
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Signed-in customer's profile"),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse)
    ),
    security(("cookie" = [])),
    tag = "Auth"
)]
pub async fn me(
    session: CustomerSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .get_customer(session.customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(customer))
}

#[utoipa::path(
    put,
    path = "/api/auth/me",
    request_body = UpdateProfileInput,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse)
    ),
    security(("cookie" = [])),
    tag = "Auth"
)]
pub async fn update_me(
    session: CustomerSession,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let customer = state
        .services
        .customers
        .update_profile(session.customer_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(customer))
}

pub async fn staff_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<StaffLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let staff = state
        .services
        .staff
        .login(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;

    let role = SessionRole::from(staff.role);
    let token = state
        .tokens
        .issue(staff.id, role, staff.kitchen_id)
        .map_err(issue_error)?;
    let expires_in = state.tokens.ttl_secs(role);
    let jar = jar.add(session_cookie(
        STAFF_COOKIE,
        token.clone(),
        expires_in,
        state.config.cookie_secure,
    ));

    Ok((
        jar,
        success_response(StaffSessionResponse {
            token,
            expires_in,
            staff,
        }),
    ))
}

pub async fn staff_logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_cookie(STAFF_COOKIE, state.config.cookie_secure)),
        axum::http::StatusCode::NO_CONTENT,
    )
}
