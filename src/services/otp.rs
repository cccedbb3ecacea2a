use crate::{
    config::OtpConfig,
    entities::{otp_code, CustomerModel, OtpCode},
    errors::ServiceError,
    services::{
        customers::{normalize_phone, upsert_verified},
        notifications::Notifier,
    },
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OtpRequested {
    pub phone: String,
    pub expires_in_secs: u64,
}

/// Phone login with one-time SMS codes.
///
/// Only an HMAC of `phone:code` is stored, keyed with the server secret, so a database
/// dump does not reveal live codes.
#[derive(Clone)]
pub struct OtpService {
    db: Arc<DatabaseConnection>,
    config: OtpConfig,
    secret: Arc<[u8]>,
    notifier: Notifier,
}

impl OtpService {
    pub fn new(db: Arc<DatabaseConnection>, config: OtpConfig, secret: &str, notifier: Notifier) -> Self {
        Self {
            db,
            config,
            secret: Arc::from(secret.as_bytes()),
            notifier,
        }
    }

    fn mac(&self, phone: &str, code: &str) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret[..])
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        mac.update(phone.as_bytes());
        mac.update(b":");
        mac.update(code.as_bytes());
        Ok(mac)
    }

    fn hash_code(&self, phone: &str, code: &str) -> Result<String, ServiceError> {
        Ok(hex::encode(self.mac(phone, code)?.finalize().into_bytes()))
    }

    fn code_matches(&self, phone: &str, code: &str, stored_hash: &str) -> Result<bool, ServiceError> {
        let Ok(expected) = hex::decode(stored_hash) else {
            return Ok(false);
        };
        Ok(self.mac(phone, code)?.verify_slice(&expected).is_ok())
    }

    fn generate_code() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }

    #[instrument(skip(self))]
    pub async fn request_code(&self, phone: &str) -> Result<OtpRequested, ServiceError> {
        let phone = normalize_phone(phone)?;
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.config.window_secs as i64);

        let recent = OtpCode::find()
            .filter(otp_code::Column::Phone.eq(phone.as_str()))
            .filter(otp_code::Column::CreatedAt.gt(window_start))
            .count(&*self.db)
            .await?;
        if recent >= self.config.max_per_window {
            warn!(phone = %phone, recent, "otp request rate limited");
            return Err(ServiceError::RateLimitExceeded);
        }

        let code = Self::generate_code();
        otp_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            phone: Set(phone.clone()),
            code_hash: Set(self.hash_code(&phone, &code)?),
            attempts: Set(0),
            expires_at: Set(now + Duration::seconds(self.config.ttl_secs as i64)),
            consumed_at: Set(None),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.notifier.send_otp(&phone, &code).await;
        info!(phone = %phone, "otp issued");

        Ok(OtpRequested {
            phone,
            expires_in_secs: self.config.ttl_secs,
        })
    }

    /// Checks the newest pending code for the phone; on success the code is consumed and
    /// the customer is created or marked verified.
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, phone: &str, code: &str) -> Result<CustomerModel, ServiceError> {
        let phone = normalize_phone(phone)?;
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let pending = OtpCode::find()
            .filter(otp_code::Column::Phone.eq(phone.as_str()))
            .filter(otp_code::Column::ConsumedAt.is_null())
            .order_by_desc(otp_code::Column::CreatedAt)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("no pending code for this phone".to_string()))?;

        if pending.expires_at <= now {
            return Err(ServiceError::Unauthorized("code has expired".to_string()));
        }
        if pending.attempts >= self.config.max_attempts {
            return Err(ServiceError::RateLimitExceeded);
        }

        if !self.code_matches(&phone, code.trim(), &pending.code_hash)? {
            OtpCode::update_many()
                .col_expr(
                    otp_code::Column::Attempts,
                    Expr::col(otp_code::Column::Attempts).add(1),
                )
                .filter(otp_code::Column::Id.eq(pending.id))
                .exec(&txn)
                .await?;
            txn.commit().await?;
            warn!(phone = %phone, attempts = pending.attempts + 1, "wrong otp code");
            return Err(ServiceError::Unauthorized("invalid code".to_string()));
        }

        let mut consumed: otp_code::ActiveModel = pending.into();
        consumed.consumed_at = Set(Some(now));
        consumed.update(&txn).await?;

        let customer = upsert_verified(&txn, &phone).await?;
        txn.commit().await?;

        info!(customer_id = %customer.id, "phone verified");
        Ok(customer)
    }
}
