use crate::auth::CUSTOMER_COOKIE;
use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

/// Registers the customer session cookie as the `cookie` security scheme
struct SessionCookie;

impl Modify for SessionCookie {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(CUSTOMER_COOKIE))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cookie Delivery API",
        version = "0.3.0",
        description = r#"
Public storefront, cart and checkout API for the cookie delivery shop.

Customers sign in with a one-time code sent by SMS. The session is a JWT carried in an
HttpOnly cookie; the same token is returned in the login body for API clients.

Errors share one body shape:

```json
{ "error": "Not Found", "message": "Product 3f0c... not found", "request_id": "...", "timestamp": "..." }
```

Back office (`/api/admin`) and kitchen panel (`/api/kitchen`) routes are staff-only and not listed here.
        "#
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&SessionCookie),
    tags(
        (name = "Storefront", description = "Catalog, delivery areas and dates"),
        (name = "Auth", description = "OTP login and customer profile"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Checkout", description = "Order placement"),
        (name = "Orders", description = "Customer order history"),
        (name = "Payments", description = "Payment provider callbacks")
    ),
    paths(
        crate::handlers::storefront::list_products,
        crate::handlers::storefront::get_product,
        crate::handlers::storefront::list_flavors,
        crate::handlers::storefront::list_cities,
        crate::handlers::storefront::list_city_zones,
        crate::handlers::storefront::delivery_dates,
        crate::handlers::storefront::validate_promo,

        crate::handlers::auth::request_otp,
        crate::handlers::auth::verify_otp,
        crate::handlers::auth::logout,
        crate::handlers::auth::me,
        crate::handlers::auth::update_me,

        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::apply_promo,
        crate::handlers::carts::remove_promo,

        crate::handlers::checkout::checkout,

        crate::handlers::orders::list_my_orders,
        crate::handlers::orders::get_my_order,

        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(
        schemas(
            crate::handlers::auth::OtpRequest,
            crate::handlers::auth::OtpVerifyRequest,
            crate::handlers::storefront::ValidatePromoRequest,
            crate::services::otp::OtpRequested,
            crate::services::customers::UpdateProfileInput,
            crate::services::cart::CreateCartInput,
            crate::services::cart::AddCartItemInput,
            crate::services::cart::UpdateCartItemInput,
            crate::services::cart::ApplyPromoInput,
            crate::services::cart::CartLine,
            crate::services::cart::CartView,
            crate::services::checkout::CheckoutInput,
            crate::services::delivery::DeliveryDates,
            crate::services::promotions::PromoOutcome,
            crate::services::payments::PaymentSession,
            crate::services::payments::PaymentWebhookEvent,
            crate::services::payments::WebhookPaymentStatus,
            crate::entities::OrderStatus,
            crate::entities::PaymentStatus,
            crate::entities::PaymentMethod,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

/// Serves the generated document as JSON
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_public_routes_and_cookie_scheme() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("Cookie Delivery API"));
        assert!(json.contains("/api/checkout"));
        assert!(json.contains("/api/payments/webhook"));
        assert!(!json.contains("/api/admin"));
        assert!(json.contains("\"cookie\""));
    }
}
