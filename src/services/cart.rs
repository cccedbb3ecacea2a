use crate::{
    entities::{
        cart, cart_item, product, promo_code, Cart, CartItem, CartModel, CartStatus, Product,
        PromoCode,
    },
    errors::ServiceError,
    services::promotions::{evaluate, normalize_code, PromoOutcome},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateCartInput {
    /// Client-held identifier for anonymous carts; generated when omitted
    #[validate(length(min = 8, max = 128))]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddCartItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    #[validate(range(min = 0, max = 100))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ApplyPromoInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub line_total: Decimal,
}

/// Cart with its lines and the totals the storefront shows before checkout
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub session_id: String,
    pub customer_id: Option<Uuid>,
    #[schema(value_type = String, example = "active")]
    pub status: CartStatus,
    pub expires_at: DateTime<Utc>,
    pub items: Vec<CartLine>,
    pub item_count: i32,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    pub promo_code: Option<String>,
    /// Present when the stored code still applies to the current subtotal
    pub promo: Option<PromoOutcome>,
}

/// Anonymous carts are open to whoever holds their id; carts tied to a customer only to
/// that customer.
fn ensure_access(cart: &CartModel, customer_id: Option<Uuid>) -> Result<(), ServiceError> {
    match cart.customer_id {
        Some(owner) if Some(owner) != customer_id => Err(ServiceError::Forbidden(
            "cart belongs to another customer".to_string(),
        )),
        _ => Ok(()),
    }
}

fn ensure_open(cart: &CartModel, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if cart.status != CartStatus::Active {
        return Err(ServiceError::InvalidOperation(format!(
            "cart is {}",
            cart.status
        )));
    }
    if cart.is_expired_at(now) {
        return Err(ServiceError::InvalidOperation("cart has expired".to_string()));
    }
    Ok(())
}

pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<CartLine>, ServiceError> {
    let rows = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .find_also_related(Product)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(item, product)| CartLine {
            id: item.id,
            product_id: item.product_id,
            product_name: product.map(|p| p.name).unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total(),
        })
        .collect())
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    ttl: Duration,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, cart_ttl_hours: i64) -> Self {
        Self {
            db,
            ttl: Duration::hours(cart_ttl_hours),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_cart(
        &self,
        session_id: Option<String>,
        customer_id: Option<Uuid>,
    ) -> Result<CartModel, ServiceError> {
        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string())),
            customer_id: Set(customer_id),
            status: Set(CartStatus::Active),
            promo_code: Set(None),
            expires_at: Set(now + self.ttl),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        debug!(cart_id = %cart.id, "cart created");
        Ok(cart)
    }

    /// Reuses the session's open cart when there is one
    #[instrument(skip(self))]
    pub async fn get_or_create_for_session(
        &self,
        session_id: Option<String>,
        customer_id: Option<Uuid>,
    ) -> Result<CartView, ServiceError> {
        if let Some(session) = session_id.as_deref() {
            let existing = Cart::find()
                .filter(cart::Column::SessionId.eq(session))
                .filter(cart::Column::Status.eq(CartStatus::Active))
                .filter(cart::Column::ExpiresAt.gt(Utc::now()))
                .order_by_desc(cart::Column::CreatedAt)
                .one(&*self.db)
                .await?;
            if let Some(cart) = existing {
                if ensure_access(&cart, customer_id).is_ok() {
                    return self.view(cart).await;
                }
            }
        }

        let cart = self.create_cart(session_id, customer_id).await?;
        self.view(cart).await
    }

    async fn find_cart(&self, id: Uuid, customer_id: Option<Uuid>) -> Result<CartModel, ServiceError> {
        let cart = Cart::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart", id))?;
        ensure_access(&cart, customer_id)?;
        Ok(cart)
    }

    async fn open_cart(&self, id: Uuid, customer_id: Option<Uuid>) -> Result<CartModel, ServiceError> {
        let cart = self.find_cart(id, customer_id).await?;
        ensure_open(&cart, Utc::now())?;
        Ok(cart)
    }

    async fn view(&self, cart: CartModel) -> Result<CartView, ServiceError> {
        let items = load_lines(&*self.db, cart.id).await?;
        let subtotal: Decimal = items.iter().map(|line| line.line_total).sum();

        let promo = match cart.promo_code.as_deref() {
            Some(code) => PromoCode::find()
                .filter(promo_code::Column::Code.eq(code))
                .one(&*self.db)
                .await?
                .and_then(|promo| evaluate(&promo, subtotal, Utc::now()).ok()),
            None => None,
        };

        Ok(CartView {
            id: cart.id,
            session_id: cart.session_id,
            customer_id: cart.customer_id,
            status: cart.status,
            expires_at: cart.expires_at,
            item_count: items.iter().map(|line| line.quantity).sum(),
            items,
            subtotal,
            promo_code: cart.promo_code,
            promo,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, id: Uuid, customer_id: Option<Uuid>) -> Result<CartView, ServiceError> {
        let cart = self.find_cart(id, customer_id).await?;
        self.view(cart).await
    }

    /// Bumps `updated_at` and slides the expiry forward
    async fn touch<C: ConnectionTrait>(&self, conn: &C, cart: CartModel) -> Result<CartModel, ServiceError> {
        let now = Utc::now();
        let mut active: cart::ActiveModel = cart.into();
        active.expires_at = Set(now + self.ttl);
        active.updated_at = Set(now);
        Ok(active.update(conn).await?)
    }

    /// Adds units of a product, merging with an existing line for the same product
    #[instrument(skip(self, input), fields(product_id = %input.product_id, quantity = input.quantity))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        customer_id: Option<Uuid>,
        input: AddCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let cart = self.open_cart(cart_id, customer_id).await?;

        let txn = self.db.begin().await?;
        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::not_found("Product", input.product_id))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&txn)
            .await?;
        let quantity = existing.as_ref().map_or(0, |line| line.quantity) + input.quantity;
        if quantity > product.stock_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "only {} of {} left",
                product.stock_quantity, product.name
            )));
        }

        let now = Utc::now();
        match existing {
            Some(line) => {
                let mut line: cart_item::ActiveModel = line.into();
                line.quantity = Set(quantity);
                line.unit_price = Set(product.price);
                line.updated_at = Set(now);
                line.update(&txn).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(quantity),
                    unit_price: Set(product.price),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }
        let cart = self.touch(&txn, cart).await?;
        txn.commit().await?;

        self.view(cart).await
    }

    /// Sets a line's quantity; zero removes the line
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        customer_id: Option<Uuid>,
        input: UpdateCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        if input.quantity == 0 {
            return self.remove_item(cart_id, item_id, customer_id).await;
        }
        let cart = self.open_cart(cart_id, customer_id).await?;

        let txn = self.db.begin().await?;
        let (line, product) = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart item", item_id))?;
        let product = product
            .filter(|p| p.is_active)
            .ok_or_else(|| ServiceError::not_found("Product", line.product_id))?;
        if input.quantity > product.stock_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "only {} of {} left",
                product.stock_quantity, product.name
            )));
        }

        let mut line: cart_item::ActiveModel = line.into();
        line.quantity = Set(input.quantity);
        line.unit_price = Set(product.price);
        line.updated_at = Set(Utc::now());
        line.update(&txn).await?;
        let cart = self.touch(&txn, cart).await?;
        txn.commit().await?;

        self.view(cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        customer_id: Option<Uuid>,
    ) -> Result<CartView, ServiceError> {
        let cart = self.open_cart(cart_id, customer_id).await?;

        let txn = self.db.begin().await?;
        let result = CartItem::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Cart item", item_id));
        }
        let cart = self.touch(&txn, cart).await?;
        txn.commit().await?;

        self.view(cart).await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, cart_id: Uuid, customer_id: Option<Uuid>) -> Result<CartView, ServiceError> {
        let cart = self.open_cart(cart_id, customer_id).await?;

        let txn = self.db.begin().await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let mut active: cart::ActiveModel = cart.into();
        active.promo_code = Set(None);
        let cart = active.update(&txn).await?;
        let cart = self.touch(&txn, cart).await?;
        txn.commit().await?;

        self.view(cart).await
    }

    /// Stores a code on the cart after checking it against the current subtotal
    #[instrument(skip(self, input))]
    pub async fn apply_promo(
        &self,
        cart_id: Uuid,
        customer_id: Option<Uuid>,
        input: ApplyPromoInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let cart = self.open_cart(cart_id, customer_id).await?;
        let code = normalize_code(&input.code);

        let promo = PromoCode::find()
            .filter(promo_code::Column::Code.eq(code.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Promo code {} not found", code)))?;
        let subtotal: Decimal = load_lines(&*self.db, cart.id)
            .await?
            .iter()
            .map(|line| line.line_total)
            .sum();
        evaluate(&promo, subtotal, Utc::now())?;

        let mut active: cart::ActiveModel = cart.into();
        active.promo_code = Set(Some(promo.code));
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;

        self.view(cart).await
    }

    #[instrument(skip(self))]
    pub async fn remove_promo(&self, cart_id: Uuid, customer_id: Option<Uuid>) -> Result<CartView, ServiceError> {
        let cart = self.open_cart(cart_id, customer_id).await?;
        let mut active: cart::ActiveModel = cart.into();
        active.promo_code = Set(None);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&*self.db).await?;
        self.view(cart).await
    }

    /// Marks every active cart that expired before `now` as abandoned
    #[instrument(skip(self))]
    pub async fn abandon_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = Cart::update_many()
            .col_expr(cart::Column::Status, Expr::value(CartStatus::Abandoned))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .filter(cart::Column::ExpiresAt.lt(now))
            .exec(&*self.db)
            .await?;

        info!(abandoned = result.rows_affected, "expired carts cleaned up");
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::TtlCache,
        db::{establish_connection_with_config, run_migrations, DbConfig},
        entities::ProductModel,
        services::catalog::{CatalogService, CreateProductInput},
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn setup() -> (CartService, ProductModel) {
        let db = Arc::new(
            establish_connection_with_config(&DbConfig {
                url: "sqlite::memory:".into(),
                max_connections: 1,
                ..Default::default()
            })
            .await
            .unwrap(),
        );
        run_migrations(&db).await.unwrap();
        let product = CatalogService::new(db.clone(), TtlCache::default())
            .create_product(CreateProductInput {
                name: "Double Chocolate".into(),
                description: None,
                flavor_id: None,
                price: dec!(2.50),
                stock_quantity: 5,
                image_url: None,
                is_active: None,
            })
            .await
            .unwrap();
        (CartService::new(db, 48), product)
    }

    fn add(product: &ProductModel, quantity: i32) -> AddCartItemInput {
        AddCartItemInput {
            product_id: product.id,
            quantity,
        }
    }

    #[tokio::test]
    async fn adding_the_same_product_merges_lines() {
        let (carts, product) = setup().await;
        let cart = carts.create_cart(None, None).await.unwrap();

        carts.add_item(cart.id, None, add(&product, 2)).await.unwrap();
        let view = carts.add_item(cart.id, None, add(&product, 1)).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, dec!(7.50));
        assert_eq!(view.items[0].product_name, "Double Chocolate");
    }

    #[tokio::test]
    async fn quantity_is_capped_by_stock() {
        let (carts, product) = setup().await;
        let cart = carts.create_cart(None, None).await.unwrap();

        carts.add_item(cart.id, None, add(&product, 4)).await.unwrap();
        assert_matches!(
            carts.add_item(cart.id, None, add(&product, 2)).await,
            Err(ServiceError::InsufficientStock(_))
        );
    }

    #[tokio::test]
    async fn zero_quantity_removes_the_line() {
        let (carts, product) = setup().await;
        let cart = carts.create_cart(None, None).await.unwrap();
        let view = carts.add_item(cart.id, None, add(&product, 2)).await.unwrap();

        let view = carts
            .update_item(cart.id, view.items[0].id, None, UpdateCartItemInput { quantity: 0 })
            .await
            .unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal, Decimal::ZERO);
    }

    #[tokio::test]
    async fn customer_carts_are_private() {
        let (carts, product) = setup().await;
        let owner = Uuid::new_v4();
        let cart = carts.create_cart(None, Some(owner)).await.unwrap();

        assert_matches!(
            carts.add_item(cart.id, Some(Uuid::new_v4()), add(&product, 1)).await,
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(
            carts.get_cart(cart.id, None).await,
            Err(ServiceError::Forbidden(_))
        );
        assert!(carts.get_cart(cart.id, Some(owner)).await.is_ok());
    }

    #[tokio::test]
    async fn session_cart_is_reused() {
        let (carts, _) = setup().await;
        let first = carts
            .get_or_create_for_session(Some("session-abc".into()), None)
            .await
            .unwrap();
        let second = carts
            .get_or_create_for_session(Some("session-abc".into()), None)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn cleanup_abandons_only_expired_active_carts() {
        let (carts, product) = setup().await;
        let stale = carts.create_cart(None, None).await.unwrap();
        let fresh = carts.create_cart(None, None).await.unwrap();

        let later = Utc::now() + Duration::hours(49);
        let mut touched: cart::ActiveModel = fresh.clone().into();
        touched.expires_at = Set(later + Duration::hours(1));
        touched.update(&*carts.db).await.unwrap();

        assert_eq!(carts.abandon_expired(later).await.unwrap(), 1);
        assert_eq!(
            carts.get_cart(stale.id, None).await.unwrap().status,
            CartStatus::Abandoned
        );
        assert_eq!(
            carts.get_cart(fresh.id, None).await.unwrap().status,
            CartStatus::Active
        );
        assert_matches!(
            carts.add_item(stale.id, None, add(&product, 1)).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }
}
