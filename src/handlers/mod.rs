pub mod admin;
pub mod auth;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod kitchen;
pub mod orders;
pub mod payment_webhooks;
pub mod storefront;

use crate::{
    cache::TtlCache,
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    services::{
        cart::CartService,
        catalog::CatalogService,
        checkout::CheckoutService,
        customers::CustomerService,
        delivery::DeliveryService,
        kitchens::KitchenService,
        notifications::Notifier,
        orders::OrderService,
        otp::OtpService,
        payments::{gateway_from_config, PaymentGateway, PaymentService},
        promotions::PromotionService,
        staff::StaffService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub delivery: Arc<DeliveryService>,
    pub kitchens: Arc<KitchenService>,
    pub promotions: Arc<PromotionService>,
    pub customers: Arc<CustomerService>,
    pub otp: Arc<OtpService>,
    pub staff: Arc<StaffService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    /// Wires every service over one pool, one cache and the given outbound integrations
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        cache: TtlCache,
        notifier: Notifier,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let delivery = DeliveryService::new(
            db_pool.clone(),
            cache.clone(),
            config.business_utc_offset_minutes,
        );
        let payments = PaymentService::new(db_pool.clone(), gateway);
        let checkout = CheckoutService::new(
            db_pool.clone(),
            delivery.clone(),
            payments.clone(),
            notifier.clone(),
            cache.clone(),
        );

        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone(), cache.clone())),
            delivery: Arc::new(delivery),
            kitchens: Arc::new(KitchenService::new(db_pool.clone())),
            promotions: Arc::new(PromotionService::new(db_pool.clone())),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            otp: Arc::new(OtpService::new(
                db_pool.clone(),
                config.otp.clone(),
                &config.jwt_secret,
                notifier.clone(),
            )),
            staff: Arc::new(StaffService::new(db_pool.clone())),
            cart: Arc::new(CartService::new(db_pool.clone(), config.cart_ttl_hours)),
            checkout: Arc::new(checkout),
            orders: Arc::new(OrderService::new(db_pool, notifier, cache)),
            payments: Arc::new(payments),
        }
    }

    /// Builds the notifier and payment gateway from configuration
    pub fn from_config(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        cache: TtlCache,
    ) -> Result<Self, ServiceError> {
        let notifier = Notifier::from_config(&config.sms, &config.email, &config.currency)?;
        let gateway = gateway_from_config(&config.payment, &config.currency)?;
        Ok(Self::new(db_pool, config, cache, notifier, gateway))
    }
}
