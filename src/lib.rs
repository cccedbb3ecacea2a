//! Cookie Delivery API
//!
//! Storefront, cart and checkout for a cookie delivery shop, plus the back office,
//! the kitchen panel and the payment provider callback.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{auth::TokenService, cache::TtlCache, errors::ServiceError};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub tokens: TokenService,
    pub cache: TtlCache,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        services: handlers::AppServices,
        cache: TtlCache,
    ) -> Self {
        let tokens = TokenService::from_config(&config);
        Self {
            db,
            config,
            services,
            tokens,
            cache,
        }
    }

    /// Builds the full service graph from configuration
    pub fn from_config(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
    ) -> Result<Self, ServiceError> {
        let cache = TtlCache::new(config.cache_ttl());
        let services = handlers::AppServices::from_config(db.clone(), &config, cache.clone())?;
        Ok(Self::new(db, config, services, cache))
    }
}

/// Every JSON route, relative to `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Public storefront
        .merge(handlers::storefront::storefront_routes())
        .nest("/auth", handlers::auth::customer_auth_routes())
        .nest("/cart", handlers::carts::carts_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::orders_routes())
        // Signature-verified, no session
        .nest("/payments", handlers::payment_webhooks::payment_webhook_routes())
        // Staff
        .nest("/admin/auth", handlers::auth::staff_auth_routes())
        .nest("/admin", handlers::admin::admin_routes())
        .nest("/kitchen", handlers::kitchen::kitchen_routes())
}

/// Complete application with middleware, ready to serve
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;
    Router::new()
        .route("/", get(|| async { "cookie-delivery-api up" }))
        .nest("/api", api_routes())
        .merge(openapi::openapi_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cookie-delivery-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health_check(State(state): State<AppState>) -> (axum::http::StatusCode, Json<Value>) {
    let db_healthy = db::check_connection(&state.db).await.is_ok();
    let status = if db_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if db_healthy { "healthy" } else { "unhealthy" },
            "checks": {
                "database": if db_healthy { "healthy" } else { "unhealthy" },
                "cache_entries": state.cache.len(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
