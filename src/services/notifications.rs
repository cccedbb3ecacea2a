//! Outbound SMS and email.
//!
//! Every send made through [`Notifier`] is best-effort: a failing gateway is logged at
//! `warn` and the caller carries on.

use crate::{
    config::{EmailConfig, SmsConfig},
    entities::{OrderModel, OrderStatus},
    errors::ServiceError,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<(), ServiceError>;
}

fn http_client() -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))
}

async fn check_status(response: reqwest::Response, service: &str) -> Result<(), ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::ExternalServiceError(format!(
        "{} responded {}: {}",
        service,
        status,
        body.chars().take(200).collect::<String>()
    )))
}

/// JSON-over-HTTP SMS provider
pub struct HttpSmsGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    sender: String,
}

impl HttpSmsGateway {
    pub fn new(api_url: String, api_key: Option<String>, sender: String) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client()?,
            api_url,
            api_key,
            sender,
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        let mut request = self.client.post(&self.api_url).json(&json!({
            "to": to,
            "from": self.sender,
            "message": body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("sms gateway: {}", e)))?;
        check_status(response, "sms gateway").await
    }
}

/// Used when no SMS provider is configured
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), ServiceError> {
        info!(to, body, "sms (not sent, no gateway configured)");
        Ok(())
    }
}

/// JSON-over-HTTP transactional email provider
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpEmailSender {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Result<Self, ServiceError> {
        Ok(Self {
            client: http_client()?,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<(), ServiceError> {
        let mut request = self.client.post(&self.api_url).json(&json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("email api: {}", e)))?;
        check_status(response, "email api").await
    }
}

pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_email(&self, to: &[String], subject: &str, _body: &str) -> Result<(), ServiceError> {
        info!(?to, subject, "email (not sent, no provider configured)");
        Ok(())
    }
}

fn status_message(order: &OrderModel) -> Option<String> {
    let text = match order.status {
        OrderStatus::Confirmed => "has been confirmed",
        OrderStatus::Preparing => "is being baked",
        OrderStatus::Ready => "is packed and waiting for a courier",
        OrderStatus::OutForDelivery => "is on its way",
        OrderStatus::Delivered => "has been delivered. Enjoy!",
        OrderStatus::Cancelled => "has been cancelled",
        OrderStatus::Pending => return None,
    };
    Some(format!("Your cookie order {} {}", order.order_number, text))
}

/// Customer and back office messages
#[derive(Clone)]
pub struct Notifier {
    sms: Arc<dyn SmsGateway>,
    email: Arc<dyn EmailSender>,
    admin_recipients: Vec<String>,
    currency: String,
}

impl Notifier {
    pub fn new(
        sms: Arc<dyn SmsGateway>,
        email: Arc<dyn EmailSender>,
        admin_recipients: Vec<String>,
        currency: String,
    ) -> Self {
        Self {
            sms,
            email,
            admin_recipients,
            currency,
        }
    }

    /// Picks HTTP providers where a URL is configured and log-only ones otherwise
    pub fn from_config(sms: &SmsConfig, email: &EmailConfig, currency: &str) -> Result<Self, ServiceError> {
        let sms_gateway: Arc<dyn SmsGateway> = match &sms.api_url {
            Some(url) => Arc::new(HttpSmsGateway::new(
                url.clone(),
                sms.api_key.clone(),
                sms.sender.clone(),
            )?),
            None => Arc::new(LogSmsGateway),
        };
        let email_sender: Arc<dyn EmailSender> = match &email.api_url {
            Some(url) => Arc::new(HttpEmailSender::new(
                url.clone(),
                email.api_key.clone(),
                email.from.clone(),
            )?),
            None => Arc::new(LogEmailSender),
        };

        Ok(Self::new(
            sms_gateway,
            email_sender,
            email.admin_recipients(),
            currency.to_string(),
        ))
    }

    async fn sms(&self, to: &str, body: &str, kind: &'static str) {
        if let Err(e) = self.sms.send_sms(to, body).await {
            warn!(kind, to, error = %e, "sms delivery failed");
        }
    }

    #[instrument(skip(self, code))]
    pub async fn send_otp(&self, phone: &str, code: &str) {
        let body = format!("Your cookie login code is {}. It expires in a few minutes.", code);
        self.sms(phone, &body, "otp").await;
    }

    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn order_placed(&self, order: &OrderModel, customer_phone: &str) {
        let body = format!(
            "Thanks! Order {} ({} {}) is booked for {}.",
            order.order_number, order.total, self.currency, order.delivery_date
        );
        self.sms(customer_phone, &body, "order_placed").await;

        if self.admin_recipients.is_empty() {
            return;
        }
        let subject = format!("New order {}", order.order_number);
        let text = format!(
            "Order {}\nTotal: {} {}\nPayment: {} ({})\nDelivery date: {}\nAddress: {}\nNotes: {}",
            order.order_number,
            order.total,
            self.currency,
            order.payment_method,
            order.payment_status,
            order.delivery_date,
            order.delivery_address,
            order.notes.as_deref().unwrap_or("-"),
        );
        if let Err(e) = self
            .email
            .send_email(&self.admin_recipients, &subject, &text)
            .await
        {
            warn!(error = %e, "admin order email failed");
        }
    }

    #[instrument(skip(self, order), fields(order_number = %order.order_number, status = %order.status))]
    pub async fn order_status_changed(&self, order: &OrderModel, customer_phone: &str) {
        if let Some(body) = status_message(order) {
            self.sms(customer_phone, &body, "order_status").await;
        }
    }
}
