/*!
 * # Authentication
 *
 * Sessions are HS256 JWTs carried in HttpOnly cookies. Customers sign in with an SMS
 * one-time code and receive a `customer_token`; staff sign in with email and password and
 * receive a `staff_token`. Both cookies can be replaced by an `Authorization: Bearer`
 * header for API clients.
 *
 * Route protection lives in the extractors ([`CustomerSession`], [`AdminSession`],
 * [`KitchenSession`]) so a handler cannot forget the check.
 */

use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::StaffRole;
use crate::errors::ServiceError;

mod extractors;
pub mod password;

pub use extractors::{AdminSession, CustomerSession, KitchenSession, OptionalCustomerSession};

pub const CUSTOMER_COOKIE: &str = "customer_token";
pub const STAFF_COOKIE: &str = "staff_token";

/// Who a session token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionRole {
    Customer,
    Admin,
    Kitchen,
}

impl From<StaffRole> for SessionRole {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Admin => SessionRole::Admin,
            StaffRole::Kitchen => SessionRole::Kitchen,
        }
    }
}

/// Claim structure for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: SessionRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kitchen_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ServiceError::Unauthorized(err.to_string()),
            AuthError::InvalidToken | AuthError::TokenExpired => {
                ServiceError::JwtError(err.to_string())
            }
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    customer_ttl_secs: i64,
    staff_ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, issuer: impl Into<String>, customer_ttl_secs: u64, staff_ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            customer_ttl_secs: i64::try_from(customer_ttl_secs).unwrap_or(i64::MAX / 2),
            staff_ttl_secs: i64::try_from(staff_ttl_secs).unwrap_or(i64::MAX / 2),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            &cfg.jwt_secret,
            cfg.auth_issuer.clone(),
            cfg.jwt_expiration,
            cfg.staff_jwt_expiration,
        )
    }

    /// Lifetime of a token (and its cookie) for the given role, in seconds
    pub fn ttl_secs(&self, role: SessionRole) -> i64 {
        match role {
            SessionRole::Customer => self.customer_ttl_secs,
            SessionRole::Admin | SessionRole::Kitchen => self.staff_ttl_secs,
        }
    }

    pub fn issue(
        &self,
        subject: Uuid,
        role: SessionRole,
        kitchen_id: Option<Uuid>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + ChronoDuration::seconds(self.ttl_secs(role));
        let claims = Claims {
            sub: subject,
            role,
            kitchen_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "session token rejected");
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })
    }
}

/// Builds the HttpOnly cookie that carries a session token
pub fn session_cookie(
    name: &'static str,
    token: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Expired cookie that overwrites a session cookie on logout
pub fn clear_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> TokenService {
        TokenService::new(&"s".repeat(64), "cookie-delivery-api", 3600, 600)
    }

    #[test]
    fn issued_token_verifies_with_same_claims() {
        let tokens = service();
        let staff = Uuid::new_v4();
        let kitchen = Uuid::new_v4();

        let token = tokens.issue(staff, SessionRole::Kitchen, Some(kitchen)).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, staff);
        assert_eq!(claims.role, SessionRole::Kitchen);
        assert_eq!(claims.kitchen_id, Some(kitchen));
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let other = TokenService::new(&"s".repeat(64), "someone-else", 3600, 600);
        let token = other.issue(Uuid::new_v4(), SessionRole::Customer, None).unwrap();

        assert_matches!(service().verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let other = TokenService::new(&"x".repeat(64), "cookie-delivery-api", 3600, 600);
        let token = other.issue(Uuid::new_v4(), SessionRole::Admin, None).unwrap();

        assert_matches!(service().verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn expired_token_reports_expiry() {
        let tokens = service();
        let past = Utc::now() - ChronoDuration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: SessionRole::Customer,
            kitchen_id: None,
            iat: past.timestamp(),
            exp: (past + ChronoDuration::minutes(5)).timestamp(),
            iss: "cookie-delivery-api".into(),
            jti: "t".into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &tokens.encoding).unwrap();

        assert_matches!(tokens.verify(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        use axum::http::StatusCode;
        assert_eq!(
            ServiceError::from(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie(CUSTOMER_COOKIE, "abc".into(), 60, true);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let cleared = clear_cookie(CUSTOMER_COOKIE, false);
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));
    }
}
