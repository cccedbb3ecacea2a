//! Hosted card payments: session creation on the gateway and the webhook that reports
//! the outcome back.

use crate::{
    config::PaymentConfig,
    entities::{order, Order, OrderModel, PaymentStatus},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentSession {
    pub reference: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, order: &OrderModel) -> Result<PaymentSession, ServiceError>;
}

/// Gateway with a JSON API: `POST {api_url}/sessions` answering `{id, url}`
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    return_url: Option<String>,
    currency: String,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

impl HttpPaymentGateway {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        return_url: Option<String>,
        currency: String,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            return_url,
            currency,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_session(&self, order: &OrderModel) -> Result<PaymentSession, ServiceError> {
        let mut request = self
            .client
            .post(format!("{}/sessions", self.api_url))
            .json(&json!({
                "amount": order.total.round_dp(2).to_string(),
                "currency": self.currency,
                "order_number": order.order_number,
                "return_url": self.return_url,
            }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("payment gateway: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "payment gateway responded {}",
                status
            )));
        }
        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("payment gateway body: {}", e)))?;

        Ok(PaymentSession {
            reference: session.id,
            redirect_url: session.url,
        })
    }
}

/// Used when no gateway is configured; card checkout then always fails
pub struct DisabledPaymentGateway;

#[async_trait]
impl PaymentGateway for DisabledPaymentGateway {
    async fn create_session(&self, _order: &OrderModel) -> Result<PaymentSession, ServiceError> {
        Err(ServiceError::ExternalServiceError(
            "card payments are not configured".to_string(),
        ))
    }
}

pub fn gateway_from_config(
    config: &PaymentConfig,
    currency: &str,
) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
    Ok(match &config.api_url {
        Some(url) => Arc::new(HttpPaymentGateway::new(
            url.clone(),
            config.api_key.clone(),
            config.return_url.clone(),
            currency.to_string(),
        )?),
        None => Arc::new(DisabledPaymentGateway),
    })
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`
pub fn sign_webhook(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, ServiceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("webhook key: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Rejects stale timestamps and signatures that do not match the body
pub fn verify_webhook_signature(
    secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    tolerance_secs: u64,
) -> Result<(), ServiceError> {
    let invalid = || ServiceError::Unauthorized("invalid webhook signature".to_string());

    let sent_at: i64 = timestamp.trim().parse().map_err(|_| invalid())?;
    if Utc::now().timestamp().abs_diff(sent_at) > tolerance_secs {
        warn!(sent_at, "webhook timestamp outside tolerance");
        return Err(invalid());
    }

    let expected = hex::decode(signature.trim()).map_err(|_| invalid())?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("webhook key: {}", e)))?;
    mac.update(timestamp.trim().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| invalid())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WebhookPaymentStatus {
    Paid,
    Failed,
    Refunded,
}

impl From<WebhookPaymentStatus> for PaymentStatus {
    fn from(status: WebhookPaymentStatus) -> Self {
        match status {
            WebhookPaymentStatus::Paid => PaymentStatus::Paid,
            WebhookPaymentStatus::Failed => PaymentStatus::Failed,
            WebhookPaymentStatus::Refunded => PaymentStatus::Refunded,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaymentWebhookEvent {
    pub reference: String,
    pub status: WebhookPaymentStatus,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { db, gateway }
    }

    /// Opens a hosted payment page for the order and records its reference.
    /// A gateway failure leaves the order unpaid.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn start_payment(&self, order: OrderModel) -> Result<(OrderModel, PaymentSession), ServiceError> {
        let session = self.gateway.create_session(&order).await.map_err(|e| {
            warn!(error = %e, "payment session could not be created");
            ServiceError::PaymentFailed(format!(
                "order {} was placed but the payment could not be started",
                order.order_number
            ))
        })?;

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Pending);
        active.payment_reference = Set(Some(session.reference.clone()));
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        info!(reference = %session.reference, "payment session created");
        Ok((order, session))
    }

    /// Applies a gateway notification. Repeats are no-ops, and a late failure never
    /// overrides a completed payment.
    #[instrument(skip(self))]
    pub async fn apply_webhook(&self, event: PaymentWebhookEvent) -> Result<OrderModel, ServiceError> {
        let order = Order::find()
            .filter(order::Column::PaymentReference.eq(event.reference.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No order for payment reference {}", event.reference))
            })?;

        let target = PaymentStatus::from(event.status);
        let current = order.payment_status;
        let ignored = current == target
            || (current == PaymentStatus::Paid && target == PaymentStatus::Failed)
            || (current != PaymentStatus::Paid && target == PaymentStatus::Refunded);
        if ignored {
            info!(order_number = %order.order_number, %current, %target, "payment webhook ignored");
            return Ok(order);
        }

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(target);
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        info!(order_number = %order.order_number, status = %target, "payment status updated from webhook");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "whsec_test";

    fn order() -> OrderModel {
        let now = Utc::now();
        OrderModel {
            id: uuid::Uuid::new_v4(),
            order_number: "CK-20250303-ABC123".into(),
            customer_id: uuid::Uuid::new_v4(),
            zone_id: uuid::Uuid::new_v4(),
            kitchen_id: None,
            delivery_man_id: None,
            status: crate::entities::OrderStatus::Pending,
            payment_method: crate::entities::PaymentMethod::Card,
            payment_status: PaymentStatus::Unpaid,
            payment_reference: None,
            subtotal: dec!(12.50),
            discount_total: dec!(0),
            delivery_fee: dec!(4.00),
            total: dec!(16.50),
            promo_code: None,
            delivery_address: "1 Dough Lane".into(),
            delivery_date: now.date_naive(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn signature_round_trip_and_tamper() {
        let ts = Utc::now().timestamp().to_string();
        let body = br#"{"reference":"ps_1","status":"paid"}"#;
        let sig = sign_webhook(SECRET, &ts, body).unwrap();

        assert!(verify_webhook_signature(SECRET, &ts, &sig, body, 300).is_ok());
        assert_matches!(
            verify_webhook_signature(SECRET, &ts, &sig, br#"{"reference":"ps_1","status":"failed"}"#, 300),
            Err(ServiceError::Unauthorized(_))
        );
        assert_matches!(
            verify_webhook_signature("other", &ts, &sig, body, 300),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn stale_timestamps_are_rejected() {
        let ts = (Utc::now().timestamp() - 3600).to_string();
        let body = b"{}";
        let sig = sign_webhook(SECRET, &ts, body).unwrap();
        assert_matches!(
            verify_webhook_signature(SECRET, &ts, &sig, body, 300),
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[test]
    fn extreme_timestamps_are_rejected() {
        let body = b"{}";
        for ts in [i64::MIN.to_string(), i64::MAX.to_string()] {
            let sig = sign_webhook(SECRET, &ts, body).unwrap();
            assert_matches!(
                verify_webhook_signature(SECRET, &ts, &sig, body, 300),
                Err(ServiceError::Unauthorized(_))
            );
        }
    }

    #[tokio::test]
    async fn http_gateway_creates_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(header("authorization", "Bearer pay-key"))
            .and(body_partial_json(json!({
                "amount": "16.50",
                "currency": "USD",
                "order_number": "CK-20250303-ABC123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ps_123",
                "url": "https://pay.example/ps_123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpPaymentGateway::new(
            format!("{}/", server.uri()),
            Some("pay-key".into()),
            None,
            "USD".into(),
        )
        .unwrap();
        let session = gateway.create_session(&order()).await.unwrap();
        assert_eq!(session.reference, "ps_123");
        assert_eq!(session.redirect_url, "https://pay.example/ps_123");
    }

    #[tokio::test]
    async fn gateway_errors_are_external_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gateway = HttpPaymentGateway::new(server.uri(), None, None, "USD".into()).unwrap();
        assert_matches!(
            gateway.create_session(&order()).await,
            Err(ServiceError::ExternalServiceError(_))
        );
        assert_matches!(
            DisabledPaymentGateway.create_session(&order()).await,
            Err(ServiceError::ExternalServiceError(_))
        );
    }
}
