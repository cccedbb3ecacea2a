#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use cookie_delivery_api::{
    auth::{SessionRole, CUSTOMER_COOKIE, STAFF_COOKIE},
    cache::TtlCache,
    config::AppConfig,
    db,
    entities::{
        CityModel, CustomerModel, KitchenModel, OrderModel, ProductModel, StaffRole,
        StaffUserModel, ZoneModel,
    },
    errors::ServiceError,
    handlers::AppServices,
    services::{
        catalog::CreateProductInput,
        delivery::{CreateCityInput, CreateZoneInput},
        kitchens::CreateKitchenInput,
        notifications::{LogEmailSender, Notifier, SmsGateway},
        payments::{PaymentGateway, PaymentSession},
        staff::CreateStaffInput,
    },
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Records outbound SMS so tests can read login codes
#[derive(Default)]
pub struct CapturingSms {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingSms {
    pub fn messages_to(&self, phone: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == phone)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Six-digit code from the latest message sent to `phone`
    pub fn last_code(&self, phone: &str) -> Option<String> {
        self.messages_to(phone).last().and_then(|body| {
            body.split(|c: char| !c.is_ascii_digit())
                .find(|chunk| chunk.len() == 6)
                .map(str::to_string)
        })
    }
}

#[async_trait]
impl SmsGateway for CapturingSms {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

/// Hands out a deterministic hosted page per order, or fails while the provider is "down"
#[derive(Default)]
pub struct StubGateway {
    down: AtomicBool,
}

impl StubGateway {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_session(&self, order: &OrderModel) -> Result<PaymentSession, ServiceError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "payment provider unreachable".to_string(),
            ));
        }
        Ok(PaymentSession {
            reference: format!("pay_{}", order.order_number),
            redirect_url: format!("https://pay.test/{}", order.order_number),
        })
    }
}

/// Application over a throwaway SQLite file
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub sms: Arc<CapturingSms>,
    pub gateway: Arc<StubGateway>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

        let mut cfg = AppConfig::new(
            url,
            "k".repeat(64),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.cookie_secure = false;
        cfg.payment.webhook_secret = Some(WEBHOOK_SECRET.to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let sms = Arc::new(CapturingSms::default());
        let notifier = Notifier::new(
            sms.clone(),
            Arc::new(LogEmailSender),
            vec!["ops@cookies.test".to_string()],
            cfg.currency.clone(),
        );
        let gateway = Arc::new(StubGateway::default());
        let cache = TtlCache::new(cfg.cache_ttl());
        let services = AppServices::new(
            db_arc.clone(),
            &cfg,
            cache.clone(),
            notifier,
            gateway.clone(),
        );
        let state = AppState::new(db_arc, cfg, services, cache);
        let router = cookie_delivery_api::app(state.clone());

        Self {
            router,
            state,
            sms,
            gateway,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<String>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("request")).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn get(&self, uri: &str, cookie: Option<String>) -> Response {
        self.request(Method::GET, uri, None, cookie).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<String>) -> Response {
        self.request(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn put(&self, uri: &str, body: Value, cookie: Option<String>) -> Response {
        self.request(Method::PUT, uri, Some(body), cookie).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<String>) -> Response {
        self.request(Method::DELETE, uri, None, cookie).await
    }

    // Sessions

    pub fn customer_cookie(&self, customer_id: Uuid) -> String {
        let token = self
            .state
            .tokens
            .issue(customer_id, SessionRole::Customer, None)
            .expect("customer token");
        format!("{}={}", CUSTOMER_COOKIE, token)
    }

    pub fn staff_cookie(&self, staff: &StaffUserModel) -> String {
        let token = self
            .state
            .tokens
            .issue(staff.id, staff.role.into(), staff.kitchen_id)
            .expect("staff token");
        format!("{}={}", STAFF_COOKIE, token)
    }

    // Seeding through the services

    pub async fn seed_staff(
        &self,
        email: &str,
        role: StaffRole,
        kitchen_id: Option<Uuid>,
    ) -> StaffUserModel {
        self.state
            .services
            .staff
            .create_staff(CreateStaffInput {
                email: email.to_string(),
                name: "Test Staff".to_string(),
                password: "correct-horse-battery".to_string(),
                role,
                kitchen_id,
            })
            .await
            .expect("seed staff")
    }

    pub async fn seed_admin(&self) -> (StaffUserModel, String) {
        let admin = self.seed_staff("admin@cookies.test", StaffRole::Admin, None).await;
        let cookie = self.staff_cookie(&admin);
        (admin, cookie)
    }

    /// Signs a phone in through the OTP flow
    pub async fn seed_customer(&self, phone: &str) -> CustomerModel {
        let otp = &self.state.services.otp;
        otp.request_code(phone).await.expect("request code");
        let code = self.sms.last_code(phone).expect("code was sent");
        otp.verify_code(phone, &code).await.expect("verify code")
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> ProductModel {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: None,
                flavor_id: None,
                price,
                stock_quantity: stock,
                image_url: None,
                is_active: Some(true),
            })
            .await
            .expect("seed product")
    }

    pub async fn seed_kitchen(&self, name: &str) -> KitchenModel {
        self.state
            .services
            .kitchens
            .create_kitchen(CreateKitchenInput {
                name: name.to_string(),
                address: "1 Oven Lane".to_string(),
                phone: None,
                is_active: Some(true),
            })
            .await
            .expect("seed kitchen")
    }

    pub async fn seed_city(&self, name: &str) -> CityModel {
        self.state
            .services
            .delivery
            .create_city(CreateCityInput {
                name: name.to_string(),
                is_active: Some(true),
            })
            .await
            .expect("seed city")
    }

    pub async fn seed_zone(
        &self,
        city_id: Uuid,
        name: &str,
        fee: Decimal,
        kitchen_id: Option<Uuid>,
    ) -> ZoneModel {
        self.state
            .services
            .delivery
            .create_zone(CreateZoneInput {
                city_id,
                name: name.to_string(),
                delivery_fee: fee,
                kitchen_id,
                is_active: Some(true),
            })
            .await
            .expect("seed zone")
    }

    pub async fn product(&self, id: Uuid) -> ProductModel {
        self.state
            .services
            .catalog
            .get_product(id)
            .await
            .expect("product exists")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Value of the named cookie in the response's `Set-Cookie` headers
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| {
            let pair = raw.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.to_string())
        })
}
