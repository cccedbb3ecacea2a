//! Back office API. Every handler requires an admin staff session.

mod accounts;
mod catalog;
mod geography;
mod kitchens;
mod orders;
mod promotions;

use crate::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/products", get(catalog::list_products).post(catalog::create_product))
        .route(
            "/products/{id}",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/products/{id}/stock", post(catalog::adjust_stock))
        .route("/flavors", get(catalog::list_flavors).post(catalog::create_flavor))
        .route(
            "/flavors/{id}",
            get(catalog::get_flavor)
                .put(catalog::update_flavor)
                .delete(catalog::delete_flavor),
        )
        // Geography
        .route("/cities", get(geography::list_cities).post(geography::create_city))
        .route(
            "/cities/{id}",
            get(geography::get_city)
                .put(geography::update_city)
                .delete(geography::delete_city),
        )
        .route("/zones", get(geography::list_zones).post(geography::create_zone))
        .route(
            "/zones/{id}",
            get(geography::get_zone)
                .put(geography::update_zone)
                .delete(geography::delete_zone),
        )
        .route(
            "/delivery-rules",
            get(geography::list_rules).post(geography::create_rule),
        )
        .route(
            "/delivery-rules/{id}",
            get(geography::get_rule)
                .put(geography::update_rule)
                .delete(geography::delete_rule),
        )
        // Kitchens and couriers
        .route("/kitchens", get(kitchens::list_kitchens).post(kitchens::create_kitchen))
        .route(
            "/kitchens/{id}",
            get(kitchens::get_kitchen)
                .put(kitchens::update_kitchen)
                .delete(kitchens::delete_kitchen),
        )
        .route(
            "/delivery-men",
            get(kitchens::list_delivery_men).post(kitchens::create_delivery_man),
        )
        .route(
            "/delivery-men/{id}",
            get(kitchens::get_delivery_man)
                .put(kitchens::update_delivery_man)
                .delete(kitchens::delete_delivery_man),
        )
        // Promotions
        .route(
            "/promo-codes",
            get(promotions::list_codes).post(promotions::create_code),
        )
        .route(
            "/promo-codes/{id}",
            get(promotions::get_code)
                .put(promotions::update_code)
                .delete(promotions::delete_code),
        )
        // Orders
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/orders/{id}/delivery-man", put(orders::assign_delivery_man))
        .route("/orders/{id}/payment-status", put(orders::update_payment_status))
        .route("/dashboard", get(orders::dashboard))
        .route("/carts/cleanup", post(orders::cleanup_carts))
        // Accounts
        .route("/customers", get(accounts::list_customers))
        .route("/customers/{id}", get(accounts::get_customer))
        .route("/staff", get(accounts::list_staff).post(accounts::create_staff))
        .route(
            "/staff/{id}",
            get(accounts::get_staff)
                .put(accounts::update_staff)
                .delete(accounts::delete_staff),
        )
}
