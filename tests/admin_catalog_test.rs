//! Back office catalog, geography and promotion management, seen through the storefront.

mod common;

use std::str::FromStr;

use axum::http::StatusCode;
use common::{response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

#[tokio::test]
async fn product_lifecycle_and_storefront_visibility() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let response = app
        .post("/api/admin/flavors", json!({ "name": "Chocolate" }), Some(admin.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let flavor = response_json(response).await;

    let response = app
        .post(
            "/api/admin/products",
            json!({
                "name": "Double Chocolate Chunk",
                "flavor_id": flavor["id"],
                "price": "3.50",
                "stock_quantity": 40
            }),
            Some(admin.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product = response_json(response).await;
    let product_id = product["id"].as_str().unwrap().to_string();
    assert_eq!(decimal(&product["price"]), dec!(3.50));

    let listed = response_json(app.get("/api/products", None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app
        .put(
            &format!("/api/admin/products/{}", product_id),
            json!({ "is_active": false }),
            Some(admin.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // storefront listings are cached; deactivation must drop the cached copy
    let listed = response_json(app.get("/api/products", None).await).await;
    assert!(listed.as_array().unwrap().is_empty());
    let hidden = app.get(&format!("/api/products/{}", product_id), None).await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let response = app
        .delete(&format!("/api/admin/products/{}", product_id), Some(admin.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let gone = app
        .get(&format!("/api/admin/products/{}", product_id), Some(admin))
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_validation_errors_are_bad_requests() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let blank_name = app
        .post(
            "/api/admin/products",
            json!({ "name": "", "price": "2.00" }),
            Some(admin.clone()),
        )
        .await;
    assert_eq!(blank_name.status(), StatusCode::BAD_REQUEST);

    let free_cookie = app
        .post(
            "/api/admin/products",
            json!({ "name": "Gratis", "price": "0" }),
            Some(admin),
        )
        .await;
    assert_eq!(free_cookie.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stock_adjustments_add_subtract_and_replace() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let product = app.seed_product("Oatmeal Raisin", dec!(2.75), 10).await;
    let uri = format!("/api/admin/products/{}/stock", product.id);

    let response = app
        .post(&uri, json!({ "mode": "add", "quantity": 5 }), Some(admin.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["stock_quantity"], 15);

    let response = app
        .post(&uri, json!({ "mode": "subtract", "quantity": 20 }), Some(admin.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.product(product.id).await.stock_quantity, 15);

    let response = app
        .post(
            &uri,
            json!({ "mode": "replace", "quantity": 3, "reason": "recount" }),
            Some(admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.product(product.id).await.stock_quantity, 3);
}

#[tokio::test]
async fn city_with_zones_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let city = response_json(
        app.post("/api/admin/cities", json!({ "name": "Springfield" }), Some(admin.clone()))
            .await,
    )
    .await;
    let city_id = city["id"].as_str().unwrap().to_string();

    let response = app
        .post(
            "/api/admin/zones",
            json!({ "city_id": city_id, "name": "Downtown", "delivery_fee": "4.00" }),
            Some(admin.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let zone_id = response_json(response).await["id"].as_str().unwrap().to_string();

    let zones = response_json(app.get(&format!("/api/cities/{}/zones", city_id), None).await).await;
    assert_eq!(zones.as_array().unwrap().len(), 1);

    let refused = app
        .delete(&format!("/api/admin/cities/{}", city_id), Some(admin.clone()))
        .await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);
    let body = response_json(refused).await;
    assert_eq!(body["error"], "Conflict");

    let response = app
        .delete(&format!("/api/admin/zones/{}", zone_id), Some(admin.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .delete(&format!("/api/admin/cities/{}", city_id), Some(admin))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cities = response_json(app.get("/api/cities", None).await).await;
    assert!(cities.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn zone_for_unknown_city_is_not_found() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let response = app
        .post(
            "/api/admin/zones",
            json!({
                "city_id": uuid::Uuid::new_v4(),
                "name": "Nowhere",
                "delivery_fee": "1.00"
            }),
            Some(admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn promo_codes_are_normalised_and_validated_on_the_storefront() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let response = app
        .post(
            "/api/admin/promo-codes",
            json!({
                "code": " sweet10 ",
                "discount_type": "percentage",
                "discount_value": "10",
                "min_order_amount": "20.00"
            }),
            Some(admin.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response_json(response).await["code"], "SWEET10");

    let duplicate = app
        .post(
            "/api/admin/promo-codes",
            json!({ "code": "SWEET10", "discount_type": "fixed", "discount_value": "1" }),
            Some(admin),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let applies = app
        .post("/api/promo/validate", json!({ "code": "sweet10", "subtotal": "25.55" }), None)
        .await;
    assert_eq!(applies.status(), StatusCode::OK);
    let outcome = response_json(applies).await;
    assert_eq!(decimal(&outcome["discount"]), dec!(2.56));
    assert_eq!(outcome["free_delivery"], false);

    let too_small = app
        .post("/api/promo/validate", json!({ "code": "SWEET10", "subtotal": "12.00" }), None)
        .await;
    assert_eq!(too_small.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .post("/api/promo/validate", json!({ "code": "NOPE", "subtotal": "50" }), None)
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delivery_dates_follow_the_configured_rule() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let response = app
        .post(
            "/api/admin/delivery-rules",
            json!({
                "name": "Standard",
                "lead_days": 2,
                "cutoff_hour": 23,
                "closed_weekdays": [],
                "max_days_ahead": 5
            }),
            Some(admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let dates = response_json(app.get("/api/delivery/dates", None).await).await;
    let list = dates["dates"].as_array().unwrap();
    assert!(!list.is_empty());
    assert!(list.len() <= 5);
    assert_eq!(dates["earliest"], list[0]);
}
