use crate::{
    entities::{promo_code, DiscountType, PromoCode, PromoCodeModel},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::{Condition, Expr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreatePromoCodeInput {
    #[validate(length(min = 2, max = 64))]
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    #[schema(value_type = String, example = "10")]
    #[serde(default)]
    pub discount_value: Decimal,
    #[schema(value_type = Option<String>)]
    pub min_order_amount: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub max_discount_amount: Option<Decimal>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePromoCodeInput {
    pub description: Option<String>,
    pub discount_type: Option<DiscountType>,
    #[schema(value_type = Option<String>)]
    pub discount_value: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub min_order_amount: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub max_discount_amount: Option<Decimal>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Why a code cannot be applied right now
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoRejection {
    #[error("is not active")]
    Inactive,
    #[error("is not valid yet")]
    NotStarted,
    #[error("has expired")]
    Expired,
    #[error("has reached its usage limit")]
    UsageLimitReached,
    #[error("requires a subtotal of at least {minimum}")]
    BelowMinimum { minimum: Decimal },
}

impl From<PromoRejection> for ServiceError {
    fn from(rejection: PromoRejection) -> Self {
        ServiceError::ValidationError(format!("promo code {}", rejection))
    }
}

/// Effect of a code on an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PromoOutcome {
    pub code: String,
    pub discount_type: DiscountType,
    /// Amount taken off the subtotal
    #[schema(value_type = String, example = "1.25")]
    pub discount: Decimal,
    pub free_delivery: bool,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies the code's rules to a subtotal.
///
/// Percentage and fixed discounts are capped by `max_discount_amount` and by the subtotal
/// itself, then rounded to cents. Free delivery never reduces the subtotal.
pub fn evaluate(
    promo: &PromoCodeModel,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<PromoOutcome, PromoRejection> {
    if !promo.is_active {
        return Err(PromoRejection::Inactive);
    }
    if promo.starts_at > now {
        return Err(PromoRejection::NotStarted);
    }
    if promo.ends_at.is_some_and(|ends| ends <= now) {
        return Err(PromoRejection::Expired);
    }
    if promo.usage_limit.is_some_and(|limit| promo.usage_count >= limit) {
        return Err(PromoRejection::UsageLimitReached);
    }
    if let Some(minimum) = promo.min_order_amount {
        if subtotal < minimum {
            return Err(PromoRejection::BelowMinimum { minimum });
        }
    }

    let raw = match promo.discount_type {
        DiscountType::Percentage => subtotal * promo.discount_value / Decimal::ONE_HUNDRED,
        DiscountType::Fixed => promo.discount_value,
        DiscountType::FreeDelivery => Decimal::ZERO,
    };
    let capped = match promo.max_discount_amount {
        Some(max) => raw.min(max),
        None => raw,
    };
    let discount = round_money(capped.min(subtotal).max(Decimal::ZERO));

    Ok(PromoOutcome {
        code: promo.code.clone(),
        discount_type: promo.discount_type,
        discount,
        free_delivery: promo.discount_type == DiscountType::FreeDelivery,
    })
}

fn validate_value(discount_type: DiscountType, value: Decimal) -> Result<(), ServiceError> {
    match discount_type {
        DiscountType::Percentage if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED => {
            Err(ServiceError::ValidationError(
                "percentage discount must be greater than 0 and at most 100".to_string(),
            ))
        }
        DiscountType::Fixed if value <= Decimal::ZERO => Err(ServiceError::ValidationError(
            "fixed discount must be greater than 0".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_dates(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> Result<(), ServiceError> {
    if ends_at.is_some_and(|ends| ends <= starts_at) {
        return Err(ServiceError::ValidationError(
            "ends_at must be after starts_at".to_string(),
        ));
    }
    Ok(())
}

/// Counts one redemption unless the limit is already used up.
/// The limit check and the increment are a single statement.
pub(crate) async fn redeem<C: ConnectionTrait>(conn: &C, promo_id: Uuid) -> Result<(), ServiceError> {
    let result = PromoCode::update_many()
        .col_expr(
            promo_code::Column::UsageCount,
            Expr::col(promo_code::Column::UsageCount).add(1),
        )
        .col_expr(promo_code::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(promo_code::Column::Id.eq(promo_id))
        .filter(
            Condition::any()
                .add(promo_code::Column::UsageLimit.is_null())
                .add(
                    Expr::col(promo_code::Column::UsageCount)
                        .lt(Expr::col(promo_code::Column::UsageLimit)),
                ),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(PromoRejection::UsageLimitReached.into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct PromotionService {
    db: Arc<DatabaseConnection>,
}

impl PromotionService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_codes(&self) -> Result<Vec<PromoCodeModel>, ServiceError> {
        Ok(PromoCode::find()
            .order_by_desc(promo_code::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_code(&self, id: Uuid) -> Result<PromoCodeModel, ServiceError> {
        PromoCode::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Promo code", id))
    }

    /// Case-insensitive lookup by code
    #[instrument(skip(self))]
    pub async fn find_by_code(&self, code: &str) -> Result<PromoCodeModel, ServiceError> {
        let code = normalize_code(code);
        PromoCode::find()
            .filter(promo_code::Column::Code.eq(code.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Promo code", code))
    }

    #[instrument(skip(self))]
    pub async fn create_code(&self, input: CreatePromoCodeInput) -> Result<PromoCodeModel, ServiceError> {
        input.validate()?;
        validate_value(input.discount_type, input.discount_value)?;
        let starts_at = input.starts_at.unwrap_or_else(Utc::now);
        validate_dates(starts_at, input.ends_at)?;

        let code = normalize_code(&input.code);
        let taken = PromoCode::find()
            .filter(promo_code::Column::Code.eq(code.as_str()))
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!("promo code {} already exists", code)));
        }

        let now = Utc::now();
        let promo = promo_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            description: Set(input.description),
            discount_type: Set(input.discount_type),
            discount_value: Set(input.discount_value),
            min_order_amount: Set(input.min_order_amount),
            max_discount_amount: Set(input.max_discount_amount),
            usage_limit: Set(input.usage_limit),
            usage_count: Set(0),
            starts_at: Set(starts_at),
            ends_at: Set(input.ends_at),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(promo_id = %promo.id, code = %promo.code, "promo code created");
        Ok(promo)
    }

    #[instrument(skip(self))]
    pub async fn update_code(
        &self,
        id: Uuid,
        input: UpdatePromoCodeInput,
    ) -> Result<PromoCodeModel, ServiceError> {
        input.validate()?;
        let existing = self.get_code(id).await?;

        let discount_type = input.discount_type.unwrap_or(existing.discount_type);
        let discount_value = input.discount_value.unwrap_or(existing.discount_value);
        validate_value(discount_type, discount_value)?;
        let starts_at = input.starts_at.unwrap_or(existing.starts_at);
        let ends_at = input.ends_at.or(existing.ends_at);
        validate_dates(starts_at, ends_at)?;

        let mut promo: promo_code::ActiveModel = existing.into();
        promo.discount_type = Set(discount_type);
        promo.discount_value = Set(discount_value);
        promo.starts_at = Set(starts_at);
        promo.ends_at = Set(ends_at);
        if let Some(description) = input.description {
            promo.description = Set(Some(description));
        }
        if let Some(min) = input.min_order_amount {
            promo.min_order_amount = Set(Some(min));
        }
        if let Some(max) = input.max_discount_amount {
            promo.max_discount_amount = Set(Some(max));
        }
        if let Some(limit) = input.usage_limit {
            promo.usage_limit = Set(Some(limit));
        }
        if let Some(is_active) = input.is_active {
            promo.is_active = Set(is_active);
        }
        promo.updated_at = Set(Utc::now());
        Ok(promo.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_code(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_code(id).await?;
        PromoCode::delete_by_id(id).exec(&*self.db).await?;
        info!(promo_id = %id, "promo code deleted");
        Ok(())
    }

    /// Storefront check of a code against a prospective subtotal
    #[instrument(skip(self))]
    pub async fn validate_code(&self, code: &str, subtotal: Decimal) -> Result<PromoOutcome, ServiceError> {
        let promo = self.find_by_code(code).await?;
        let outcome = evaluate(&promo, subtotal, Utc::now())?;
        debug!(code = %outcome.code, discount = %outcome.discount, "promo code accepted");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn promo(discount_type: DiscountType, value: Decimal) -> PromoCodeModel {
        let now = Utc::now();
        PromoCodeModel {
            id: Uuid::new_v4(),
            code: "SWEET".into(),
            description: None,
            discount_type,
            discount_value: value,
            min_order_amount: None,
            max_discount_amount: None,
            usage_limit: None,
            usage_count: 0,
            starts_at: now - Duration::days(1),
            ends_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case(DiscountType::Percentage, dec!(10), dec!(12.50), dec!(1.25))]
    #[case(DiscountType::Percentage, dec!(15), dec!(9.99), dec!(1.50))]
    #[case(DiscountType::Fixed, dec!(5), dec!(12.50), dec!(5))]
    #[case(DiscountType::Fixed, dec!(20), dec!(12.50), dec!(12.50))]
    #[case(DiscountType::FreeDelivery, dec!(0), dec!(12.50), dec!(0))]
    fn discount_amounts(
        #[case] kind: DiscountType,
        #[case] value: Decimal,
        #[case] subtotal: Decimal,
        #[case] expected: Decimal,
    ) {
        let outcome = evaluate(&promo(kind, value), subtotal, Utc::now()).unwrap();
        assert_eq!(outcome.discount, expected);
        assert_eq!(outcome.free_delivery, kind == DiscountType::FreeDelivery);
    }

    #[test]
    fn max_discount_caps_percentage() {
        let mut p = promo(DiscountType::Percentage, dec!(50));
        p.max_discount_amount = Some(dec!(3));
        assert_eq!(evaluate(&p, dec!(40), Utc::now()).unwrap().discount, dec!(3));
    }

    #[test]
    fn rejections() {
        let now = Utc::now();

        let mut p = promo(DiscountType::Fixed, dec!(1));
        p.is_active = false;
        assert_eq!(evaluate(&p, dec!(10), now), Err(PromoRejection::Inactive));

        let mut p = promo(DiscountType::Fixed, dec!(1));
        p.starts_at = now + Duration::hours(1);
        assert_eq!(evaluate(&p, dec!(10), now), Err(PromoRejection::NotStarted));

        let mut p = promo(DiscountType::Fixed, dec!(1));
        p.ends_at = Some(now - Duration::hours(1));
        assert_eq!(evaluate(&p, dec!(10), now), Err(PromoRejection::Expired));

        let mut p = promo(DiscountType::Fixed, dec!(1));
        p.usage_limit = Some(2);
        p.usage_count = 2;
        assert_eq!(evaluate(&p, dec!(10), now), Err(PromoRejection::UsageLimitReached));

        let mut p = promo(DiscountType::Fixed, dec!(1));
        p.min_order_amount = Some(dec!(20));
        assert_eq!(
            evaluate(&p, dec!(10), now),
            Err(PromoRejection::BelowMinimum { minimum: dec!(20) })
        );
    }

    #[rstest]
    #[case(DiscountType::Percentage, dec!(0), false)]
    #[case(DiscountType::Percentage, dec!(100), true)]
    #[case(DiscountType::Percentage, dec!(101), false)]
    #[case(DiscountType::Fixed, dec!(-1), false)]
    #[case(DiscountType::FreeDelivery, dec!(0), true)]
    fn discount_value_bounds(#[case] kind: DiscountType, #[case] value: Decimal, #[case] ok: bool) {
        assert_eq!(validate_value(kind, value).is_ok(), ok);
    }

    #[test]
    fn codes_are_upper_cased() {
        assert_eq!(normalize_code("  welcome10 "), "WELCOME10");
    }
}
