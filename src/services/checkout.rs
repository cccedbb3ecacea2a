//! Turns an active cart into an order.
//!
//! Everything that touches stock, promo usage, the order rows and the cart status
//! happens in one transaction; payment and notifications only run once it has
//! committed.

use crate::{
    cache::{keys, TtlCache},
    entities::{
        cart, order, order_item, promo_code, Cart, CartStatus, Customer, OrderStatus, PaymentMethod,
        PaymentStatus, Product, PromoCode,
    },
    errors::ServiceError,
    services::{
        cart::load_lines,
        catalog::take_stock,
        delivery::DeliveryService,
        notifications::Notifier,
        orders::{load_details, OrderDetails},
        payments::{PaymentService, PaymentSession},
        promotions::{evaluate, redeem},
    },
};
use chrono::{NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    pub cart_id: Uuid,
    pub zone_id: Uuid,
    /// Falls back to the address on the customer's profile
    #[validate(length(min = 5, max = 500))]
    pub delivery_address: Option<String>,
    /// Earliest available date when omitted
    pub delivery_date: Option<NaiveDate>,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub order: OrderDetails,
    /// Hosted payment page for card orders
    pub payment: Option<PaymentSession>,
}

/// `CK-YYYYMMDD-XXXXXX` with six upper-case alphanumerics
pub fn generate_order_number(date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("CK-{}-{}", date.format("%Y%m%d"), suffix)
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    delivery: DeliveryService,
    payments: PaymentService,
    notifier: Notifier,
    cache: TtlCache,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        delivery: DeliveryService,
        payments: PaymentService,
        notifier: Notifier,
        cache: TtlCache,
    ) -> Self {
        Self {
            db,
            delivery,
            payments,
            notifier,
            cache,
        }
    }

    #[instrument(skip(self, input), fields(cart_id = %input.cart_id, zone_id = %input.zone_id))]
    pub async fn checkout(&self, customer_id: Uuid, input: CheckoutInput) -> Result<CheckoutResult, ServiceError> {
        input.validate()?;

        let customer = Customer::find_by_id(customer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", customer_id))?;
        let delivery_address = input
            .delivery_address
            .as_deref()
            .or(customer.address.as_deref())
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::ValidationError("delivery_address is required".to_string()))?;
        let zone = self.delivery.get_active_zone(input.zone_id).await?;
        let delivery_date = self.delivery.resolve_delivery_date(input.delivery_date).await?;

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(input.cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart", input.cart_id))?;
        if cart.customer_id.is_some_and(|owner| owner != customer.id) {
            return Err(ServiceError::Forbidden("cart belongs to another customer".to_string()));
        }
        if cart.status != CartStatus::Active || cart.is_expired_at(Utc::now()) {
            return Err(ServiceError::InvalidOperation(
                "cart is no longer open for checkout".to_string(),
            ));
        }
        let lines = load_lines(&txn, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation("cart is empty".to_string()));
        }

        // Current prices win over the ones stored on the cart lines.
        let mut priced = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = Product::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("{} is no longer available", line.product_name))
                })?;
            take_stock(&txn, product.id, line.quantity).await?;
            let line_total = product.price * Decimal::from(line.quantity);
            priced.push((product, line.quantity, line_total));
        }
        let subtotal: Decimal = priced.iter().map(|(_, _, total)| *total).sum();

        let mut discount = Decimal::ZERO;
        let mut free_delivery = false;
        if let Some(code) = cart.promo_code.as_deref() {
            let promo = PromoCode::find()
                .filter(promo_code::Column::Code.eq(code))
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::ValidationError(format!("promo code {} no longer exists", code)))?;
            let outcome = evaluate(&promo, subtotal, Utc::now())?;
            redeem(&txn, promo.id).await?;
            discount = outcome.discount;
            free_delivery = outcome.free_delivery;
        }
        let delivery_fee = if free_delivery { Decimal::ZERO } else { zone.delivery_fee };
        let total = subtotal - discount + delivery_fee;

        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(generate_order_number(now.date_naive())),
            customer_id: Set(customer.id),
            zone_id: Set(zone.id),
            kitchen_id: Set(zone.kitchen_id),
            delivery_man_id: Set(None),
            status: Set(OrderStatus::Pending),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Unpaid),
            payment_reference: Set(None),
            subtotal: Set(subtotal),
            discount_total: Set(discount),
            delivery_fee: Set(delivery_fee),
            total: Set(total),
            promo_code: Set(cart.promo_code.clone()),
            delivery_address: Set(delivery_address),
            delivery_date: Set(delivery_date),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (product, quantity, line_total) in priced {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(product.id),
                product_name: Set(product.name),
                quantity: Set(quantity),
                unit_price: Set(product.price),
                line_total: Set(line_total),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        let mut converted: cart::ActiveModel = cart.into();
        converted.status = Set(CartStatus::Converted);
        converted.customer_id = Set(Some(customer.id));
        converted.updated_at = Set(now);
        converted.update(&txn).await?;

        txn.commit().await?;
        self.cache.invalidate_prefix(keys::PRODUCTS);
        info!(order_number = %order.order_number, total = %order.total, "order placed");

        self.notifier.order_placed(&order, &customer.phone).await;

        let (order, payment) = match order.payment_method {
            PaymentMethod::Card => {
                let (order, session) = self.payments.start_payment(order).await?;
                (order, Some(session))
            }
            PaymentMethod::Cash => (order, None),
        };

        Ok(CheckoutResult {
            order: load_details(&*self.db, order).await?,
            payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_carry_the_date_and_a_random_suffix() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let number = generate_order_number(date);

        assert!(number.starts_with("CK-20250303-"));
        let suffix = &number["CK-20250303-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_ne!(generate_order_number(date), generate_order_number(date));
    }
}
