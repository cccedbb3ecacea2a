//! Couriers, the day dashboard, cart cleanup and health over HTTP.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{response_json, TestApp};
use cookie_delivery_api::entities::StaffRole;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

const PHONE: &str = "+15550100300";

/// Places a confirmed cash order for two cookies in a zone served by `kitchen_id`
async fn confirmed_order(app: &TestApp, admin: &str, kitchen_id: Uuid) -> Value {
    let city = app.seed_city("Shelbyville").await;
    let zone = app
        .seed_zone(city.id, &format!("Zone {}", kitchen_id), dec!(2.00), Some(kitchen_id))
        .await;
    let product = app.seed_product("Butter Crunch", dec!(3.00), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);

    let cart = response_json(app.post("/api/cart", json!({}), Some(cookie.clone())).await).await;
    let cart_id = cart["id"].as_str().unwrap();
    app.post(
        &format!("/api/cart/{}/items", cart_id),
        json!({ "product_id": product.id, "quantity": 2 }),
        Some(cookie.clone()),
    )
    .await;

    let placed = response_json(
        app.post(
            "/api/checkout",
            json!({
                "cart_id": cart_id,
                "zone_id": zone.id,
                "delivery_address": "12 Harbour Road",
                "payment_method": "cash"
            }),
            Some(cookie),
        )
        .await,
    )
    .await;
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    let confirmed = app
        .put(
            &format!("/api/admin/orders/{}/status", order_id),
            json!({ "status": "confirmed" }),
            Some(admin.to_string()),
        )
        .await;
    assert_eq!(confirmed.status(), StatusCode::OK);
    response_json(confirmed).await
}

async fn courier(app: &TestApp, admin: &str, name: &str, kitchen_id: Uuid) -> Value {
    let response = app
        .post(
            "/api/admin/delivery-men",
            json!({ "name": name, "phone": "+15550109999", "kitchen_id": kitchen_id }),
            Some(admin.to_string()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

#[tokio::test]
async fn kitchen_assigns_its_own_couriers_only() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let kitchen = app.seed_kitchen("Central").await;
    let other = app.seed_kitchen("Harbour").await;
    let cook = app
        .seed_staff("cook@cookies.test", StaffRole::Kitchen, Some(kitchen.id))
        .await;
    let cook_cookie = app.staff_cookie(&cook);

    let order = confirmed_order(&app, &admin, kitchen.id).await;
    let ours = courier(&app, &admin, "Dana", kitchen.id).await;
    let theirs = courier(&app, &admin, "Lee", other.id).await;

    let listed = response_json(app.get("/api/kitchen/delivery-men", Some(cook_cookie.clone())).await).await;
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Dana"]);

    let uri = format!("/api/kitchen/orders/{}/delivery-man", order["id"].as_str().unwrap());
    let refused = app
        .put(&uri, json!({ "delivery_man_id": theirs["id"] }), Some(cook_cookie.clone()))
        .await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let response = app
        .put(&uri, json!({ "delivery_man_id": ours["id"] }), Some(cook_cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["delivery_man_id"], ours["id"]);
}

#[tokio::test]
async fn dashboard_counts_orders_for_the_delivery_day() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let kitchen = app.seed_kitchen("Central").await;
    let order = confirmed_order(&app, &admin, kitchen.id).await;
    let date = order["delivery_date"].as_str().unwrap().to_string();

    let summary = response_json(
        app.get(&format!("/api/admin/dashboard?date={}", date), Some(admin.clone()))
            .await,
    )
    .await;
    assert_eq!(summary["total_orders"], 1);
    assert_eq!(summary["orders_by_status"]["confirmed"], 1);
    assert_eq!(summary["unassigned_orders"], 1);

    let quiet = response_json(app.get("/api/admin/dashboard?date=2001-01-01", Some(admin)).await).await;
    assert_eq!(quiet["total_orders"], 0);
}

#[tokio::test]
async fn cleanup_abandons_only_expired_carts() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;

    let cart = response_json(app.post("/api/cart", json!({}), None).await).await;
    let cart_uri = format!("/api/cart/{}", cart["id"].as_str().unwrap());

    let response = app.post("/api/admin/carts/cleanup", json!({}), Some(admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["abandoned"], 0);

    let later = Utc::now() + Duration::hours(app.state.config.cart_ttl_hours + 1);
    let abandoned = app
        .state
        .services
        .cart
        .abandon_expired(later)
        .await
        .expect("cleanup");
    assert_eq!(abandoned, 1);

    let cart = response_json(app.get(&cart_uri, None).await).await;
    assert_eq!(cart["status"], "abandoned");
}

#[tokio::test]
async fn health_reports_database() {
    let app = TestApp::new().await;
    let response = app.get("/api/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "healthy");
}
