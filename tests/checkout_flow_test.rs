//! Cart to order: stock, promo codes, cancellation and card payments.

mod common;

use std::str::FromStr;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Utc;
use common::{response_json, TestApp, WEBHOOK_SECRET};
use cookie_delivery_api::{
    entities::{StaffRole, ZoneModel},
    services::payments::{sign_webhook, SIGNATURE_HEADER, TIMESTAMP_HEADER},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

const PHONE: &str = "+15550100200";

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

async fn delivery_zone(app: &TestApp, fee: Decimal) -> ZoneModel {
    let kitchen = app.seed_kitchen("Central").await;
    let city = app.seed_city("Springfield").await;
    app.seed_zone(city.id, "Downtown", fee, Some(kitchen.id)).await
}

/// Opens a cart for the customer and fills it with `quantity` of `product_id`
async fn filled_cart(app: &TestApp, cookie: &str, product_id: Uuid, quantity: i32) -> String {
    let response = app.post("/api/cart", json!({}), Some(cookie.to_string())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cart_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .post(
            &format!("/api/cart/{}/items", cart_id),
            json!({ "product_id": product_id, "quantity": quantity }),
            Some(cookie.to_string()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    cart_id
}

fn checkout_body(cart_id: &str, zone_id: Uuid, payment_method: &str) -> Value {
    json!({
        "cart_id": cart_id,
        "zone_id": zone_id,
        "delivery_address": "742 Evergreen Terrace",
        "payment_method": payment_method
    })
}

#[tokio::test]
async fn cash_checkout_places_order_and_takes_stock() {
    let app = TestApp::new().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let product = app.seed_product("Snickerdoodle", dec!(3.00), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);

    let cart_id = filled_cart(&app, &cookie, product.id, 4).await;
    let cart = response_json(app.get(&format!("/api/cart/{}", cart_id), Some(cookie.clone())).await).await;
    assert_eq!(decimal(&cart["subtotal"]), dec!(12.00));
    assert_eq!(cart["item_count"], 4);

    let response = app
        .post("/api/checkout", checkout_body(&cart_id, zone.id, "cash"), Some(cookie.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let order = &body["order"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "unpaid");
    assert_eq!(order["kitchen_id"], json!(zone.kitchen_id));
    assert_eq!(decimal(&order["total"]), dec!(16.00));
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert!(body["payment"].is_null());
    let order_number = order["order_number"].as_str().unwrap().to_string();

    assert_eq!(app.product(product.id).await.stock_quantity, 6);

    let cart = response_json(app.get(&format!("/api/cart/{}", cart_id), Some(cookie.clone())).await).await;
    assert_eq!(cart["status"], "converted");

    let mine = response_json(app.get("/api/orders", Some(cookie.clone())).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let detail = app
        .get(&format!("/api/orders/{}", order_number), Some(cookie))
        .await;
    assert_eq!(detail.status(), StatusCode::OK);

    let stranger = app.seed_customer("+15550100999").await;
    let hidden = app
        .get(
            &format!("/api/orders/{}", order_number),
            Some(app.customer_cookie(stranger.id)),
        )
        .await;
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    assert!(app
        .sms
        .messages_to(PHONE)
        .iter()
        .any(|message| message.contains(&order_number)));
}

#[tokio::test]
async fn checkout_beyond_stock_writes_nothing() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let product = app.seed_product("Macadamia", dec!(3.25), 5).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);
    let cart_id = filled_cart(&app, &cookie, product.id, 4).await;

    // someone else bought most of the batch meanwhile
    let response = app
        .post(
            &format!("/api/admin/products/{}/stock", product.id),
            json!({ "mode": "replace", "quantity": 2 }),
            Some(admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post("/api/checkout", checkout_body(&cart_id, zone.id, "cash"), Some(cookie.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(app.product(product.id).await.stock_quantity, 2);
    let cart = response_json(app.get(&format!("/api/cart/{}", cart_id), Some(cookie.clone())).await).await;
    assert_eq!(cart["status"], "active");
    let mine = response_json(app.get("/api/orders", Some(cookie)).await).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn adding_more_than_stock_to_cart_is_refused() {
    let app = TestApp::new().await;
    let product = app.seed_product("Ginger Snap", dec!(2.00), 3).await;

    let cart = response_json(app.post("/api/cart", json!({}), None).await).await;
    let response = app
        .post(
            &format!("/api/cart/{}/items", cart["id"].as_str().unwrap()),
            json!({ "product_id": product.id, "quantity": 4 }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn checkout_needs_a_session_and_a_non_empty_cart() {
    let app = TestApp::new().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);

    let cart = response_json(app.post("/api/cart", json!({}), Some(cookie.clone())).await).await;
    let cart_id = cart["id"].as_str().unwrap();

    let anonymous = app
        .post("/api/checkout", checkout_body(cart_id, zone.id, "cash"), None)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let empty = app
        .post("/api/checkout", checkout_body(cart_id, zone.id, "cash"), Some(cookie))
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn customer_carts_are_private() {
    let app = TestApp::new().await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);

    let cart = response_json(app.post("/api/cart", json!({}), Some(cookie)).await).await;
    let uri = format!("/api/cart/{}", cart["id"].as_str().unwrap());

    let anonymous = app.get(&uri, None).await;
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);

    let other = app.seed_customer("+15550100999").await;
    let as_other = app.get(&uri, Some(app.customer_cookie(other.id))).await;
    assert_eq!(as_other.status(), StatusCode::FORBIDDEN);
}

/// Stock level of a product as the storefront listing reports it
async fn listed_stock(app: &TestApp, product_id: Uuid) -> i64 {
    let listing = response_json(app.get("/api/products", None).await).await;
    listing
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == json!(product_id))
        .and_then(|p| p["stock_quantity"].as_i64())
        .expect("product listed")
}

#[tokio::test]
async fn cancelling_an_order_returns_stock() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let product = app.seed_product("Peanut Butter", dec!(2.50), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);
    let cart_id = filled_cart(&app, &cookie, product.id, 3).await;

    let placed = response_json(
        app.post("/api/checkout", checkout_body(&cart_id, zone.id, "cash"), Some(cookie))
            .await,
    )
    .await;
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.product(product.id).await.stock_quantity, 7);
    assert_eq!(listed_stock(&app, product.id).await, 7);

    let response = app
        .put(
            &format!("/api/admin/orders/{}/status", order_id),
            json!({ "status": "cancelled" }),
            Some(admin.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "cancelled");
    assert_eq!(app.product(product.id).await.stock_quantity, 10);
    assert_eq!(listed_stock(&app, product.id).await, 10);

    let reopened = app
        .put(
            &format!("/api/admin/orders/{}/status", order_id),
            json!({ "status": "confirmed" }),
            Some(admin),
        )
        .await;
    assert_eq!(reopened.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.product(product.id).await.stock_quantity, 10);
}

#[tokio::test]
async fn free_delivery_code_is_redeemed_once() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let product = app.seed_product("Shortbread", dec!(5.00), 20).await;

    let response = app
        .post(
            "/api/admin/promo-codes",
            json!({ "code": "FREESHIP", "discount_type": "free_delivery", "usage_limit": 1 }),
            Some(admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);
    let cart_id = filled_cart(&app, &cookie, product.id, 2).await;

    let response = app
        .post(
            &format!("/api/cart/{}/promo", cart_id),
            json!({ "code": "freeship" }),
            Some(cookie.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = response_json(response).await;
    assert_eq!(cart["promo_code"], "FREESHIP");
    assert_eq!(cart["promo"]["free_delivery"], true);

    let placed = response_json(
        app.post("/api/checkout", checkout_body(&cart_id, zone.id, "cash"), Some(cookie))
            .await,
    )
    .await;
    let order = &placed["order"];
    assert_eq!(decimal(&order["delivery_fee"]), Decimal::ZERO);
    assert_eq!(decimal(&order["total"]), dec!(10.00));
    assert_eq!(order["promo_code"], "FREESHIP");

    let second = app.seed_customer("+15550100999").await;
    let second_cookie = app.customer_cookie(second.id);
    let second_cart = filled_cart(&app, &second_cookie, product.id, 1).await;
    let exhausted = app
        .post(
            &format!("/api/cart/{}/promo", second_cart),
            json!({ "code": "FREESHIP" }),
            Some(second_cookie),
        )
        .await;
    assert_eq!(exhausted.status(), StatusCode::BAD_REQUEST);
}

fn webhook_request(body: &Value, signature: Option<String>) -> Request<Body> {
    let payload = body.to_string();
    let timestamp = Utc::now().timestamp().to_string();
    let signature = signature.unwrap_or_else(|| {
        sign_webhook(WEBHOOK_SECRET, &timestamp, payload.as_bytes()).expect("signature")
    });

    Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(payload))
        .expect("webhook request")
}

#[tokio::test]
async fn card_checkout_is_settled_by_signed_webhook() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(3.00)).await;
    let product = app.seed_product("Red Velvet", dec!(4.00), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);
    let cart_id = filled_cart(&app, &cookie, product.id, 1).await;

    let response = app
        .post("/api/checkout", checkout_body(&cart_id, zone.id, "card"), Some(cookie))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let placed = response_json(response).await;
    let order_number = placed["order"]["order_number"].as_str().unwrap().to_string();
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();
    let reference = format!("pay_{}", order_number);
    assert_eq!(placed["payment"]["reference"], reference.as_str());
    assert_eq!(placed["order"]["payment_status"], "pending");

    let event = json!({ "reference": reference, "status": "paid" });

    let forged = app
        .send(webhook_request(&event, Some("00".repeat(32))))
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let unsigned = app
        .post("/api/payments/webhook", event.clone(), None)
        .await;
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(webhook_request(&event, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["order_number"], order_number.as_str());
    assert_eq!(body["payment_status"], "paid");

    let order = response_json(
        app.get(&format!("/api/admin/orders/{}", order_id), Some(admin))
            .await,
    )
    .await;
    assert_eq!(order["payment_status"], "paid");
}

#[tokio::test]
async fn card_checkout_keeps_the_order_when_the_provider_is_down() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(3.00)).await;
    let product = app.seed_product("Oatmeal Raisin", dec!(2.00), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);
    let cart_id = filled_cart(&app, &cookie, product.id, 2).await;

    app.gateway.set_down(true);
    let response = app
        .post("/api/checkout", checkout_body(&cart_id, zone.id, "card"), Some(cookie.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    assert_eq!(app.product(product.id).await.stock_quantity, 8);
    let cart = response_json(app.get(&format!("/api/cart/{}", cart_id), Some(cookie)).await).await;
    assert_eq!(cart["status"], "converted");

    let listing = response_json(app.get("/api/admin/orders", Some(admin)).await).await;
    let orders = listing["items"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["payment_method"], "card");
    assert_eq!(orders[0]["payment_status"], "unpaid");
    assert!(orders[0]["payment_reference"].is_null());
}

#[tokio::test]
async fn ordered_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let sold = app.seed_product("Double Chocolate", dec!(3.00), 10).await;
    let carted = app.seed_product("White Chocolate", dec!(3.00), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);

    let cart_id = filled_cart(&app, &cookie, sold.id, 1).await;
    let placed = app
        .post("/api/checkout", checkout_body(&cart_id, zone.id, "cash"), Some(cookie.clone()))
        .await;
    assert_eq!(placed.status(), StatusCode::CREATED);

    let refused = app
        .delete(&format!("/api/admin/products/{}", sold.id), Some(admin.clone()))
        .await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);
    let still_there = app
        .get(&format!("/api/admin/products/{}", sold.id), Some(admin.clone()))
        .await;
    assert_eq!(still_there.status(), StatusCode::OK);

    let open_cart = filled_cart(&app, &cookie, carted.id, 2).await;
    let deleted = app
        .delete(&format!("/api/admin/products/{}", carted.id), Some(admin.clone()))
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let gone = app
        .get(&format!("/api/admin/products/{}", carted.id), Some(admin))
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    let cart = response_json(app.get(&format!("/api/cart/{}", open_cart), Some(cookie)).await).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn webhook_for_unknown_reference_is_not_found() {
    let app = TestApp::new().await;
    let event = json!({ "reference": "pay_missing", "status": "paid" });

    let response = app.send(webhook_request(&event, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn kitchen_staff_only_see_their_kitchen() {
    let app = TestApp::new().await;
    let (_, admin) = app.seed_admin().await;
    let zone = delivery_zone(&app, dec!(4.00)).await;
    let kitchen_id = zone.kitchen_id.unwrap();
    let other_kitchen = app.seed_kitchen("Harbour").await;
    let cook = app
        .seed_staff("cook@cookies.test", StaffRole::Kitchen, Some(kitchen_id))
        .await;
    let outsider = app
        .seed_staff("other@cookies.test", StaffRole::Kitchen, Some(other_kitchen.id))
        .await;

    let product = app.seed_product("Lemon Crinkle", dec!(2.00), 10).await;
    let customer = app.seed_customer(PHONE).await;
    let cookie = app.customer_cookie(customer.id);
    let cart_id = filled_cart(&app, &cookie, product.id, 2).await;
    let placed = response_json(
        app.post("/api/checkout", checkout_body(&cart_id, zone.id, "cash"), Some(cookie))
            .await,
    )
    .await;
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/api/admin/orders/{}/status", order_id),
            json!({ "status": "confirmed" }),
            Some(admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let queue = response_json(app.get("/api/kitchen/orders", Some(app.staff_cookie(&cook))).await).await;
    assert_eq!(queue.as_array().unwrap().len(), 1);
    let elsewhere =
        response_json(app.get("/api/kitchen/orders", Some(app.staff_cookie(&outsider))).await).await;
    assert!(elsewhere.as_array().unwrap().is_empty());

    let status_uri = format!("/api/kitchen/orders/{}/status", order_id);
    let foreign = app
        .put(&status_uri, json!({ "status": "preparing" }), Some(app.staff_cookie(&outsider)))
        .await;
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);

    let back_office_only = app
        .put(&status_uri, json!({ "status": "cancelled" }), Some(app.staff_cookie(&cook)))
        .await;
    assert_eq!(back_office_only.status(), StatusCode::FORBIDDEN);

    let response = app
        .put(&status_uri, json!({ "status": "preparing" }), Some(app.staff_cookie(&cook)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["status"], "preparing");
}
