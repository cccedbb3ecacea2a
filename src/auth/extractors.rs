use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use uuid::Uuid;

use super::{AuthError, Claims, SessionRole, CUSTOMER_COOKIE, STAFF_COOKIE};
use crate::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Cookie first, then the `Authorization` header
fn session_claims(parts: &Parts, state: &AppState, cookie: &str) -> Result<Claims, AuthError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar
        .get(cookie)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| bearer_token(&parts.headers))
        .ok_or(AuthError::MissingToken)?;

    state.tokens.verify(&token)
}

/// Signed-in storefront customer
#[derive(Debug, Clone, Copy)]
pub struct CustomerSession {
    pub customer_id: Uuid,
}

impl FromRequestParts<AppState> for CustomerSession {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = session_claims(parts, state, CUSTOMER_COOKIE)?;
        if claims.role != SessionRole::Customer {
            return Err(AuthError::InsufficientPermissions);
        }
        Ok(Self {
            customer_id: claims.sub,
        })
    }
}

/// Customer session when present; anonymous shoppers get `None`
#[derive(Debug, Clone, Copy)]
pub struct OptionalCustomerSession(pub Option<CustomerSession>);

impl FromRequestParts<AppState> for OptionalCustomerSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(
            CustomerSession::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// Back-office staff with the admin role
#[derive(Debug, Clone, Copy)]
pub struct AdminSession {
    pub staff_id: Uuid,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = session_claims(parts, state, STAFF_COOKIE)?;
        match claims.role {
            SessionRole::Admin => Ok(Self {
                staff_id: claims.sub,
            }),
            _ => Err(AuthError::InsufficientPermissions),
        }
    }
}

/// Kitchen panel user. Admins may use the panel across every kitchen.
#[derive(Debug, Clone, Copy)]
pub struct KitchenSession {
    pub staff_id: Uuid,
    pub role: SessionRole,
    pub kitchen_id: Option<Uuid>,
}

impl KitchenSession {
    /// Kitchen the session is confined to; `None` means all kitchens
    pub fn scope(&self) -> Option<Uuid> {
        match self.role {
            SessionRole::Admin => None,
            _ => self.kitchen_id,
        }
    }
}

impl FromRequestParts<AppState> for KitchenSession {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = session_claims(parts, state, STAFF_COOKIE)?;
        match (claims.role, claims.kitchen_id) {
            (SessionRole::Admin, kitchen_id) | (SessionRole::Kitchen, kitchen_id @ Some(_)) => {
                Ok(Self {
                    staff_id: claims.sub,
                    role: claims.role,
                    kitchen_id,
                })
            }
            _ => Err(AuthError::InsufficientPermissions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn admin_kitchen_session_is_unscoped() {
        let kitchen = Uuid::new_v4();
        let admin = KitchenSession {
            staff_id: Uuid::new_v4(),
            role: SessionRole::Admin,
            kitchen_id: Some(kitchen),
        };
        let cook = KitchenSession {
            staff_id: Uuid::new_v4(),
            role: SessionRole::Kitchen,
            kitchen_id: Some(kitchen),
        };
        assert_eq!(admin.scope(), None);
        assert_eq!(cook.scope(), Some(kitchen));
    }
}
