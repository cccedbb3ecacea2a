use crate::{
    cache::{keys, TtlCache},
    entities::{
        cart_item, flavor, order_item, product, CartItem, Flavor, FlavorModel, OrderItem, Product,
        ProductModel,
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateFlavorInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateFlavorInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub flavor_id: Option<Uuid>,
    #[schema(value_type = String, example = "12.50")]
    pub price: Decimal,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub stock_quantity: i32,
    #[validate(length(max = 1024))]
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub flavor_id: Option<Uuid>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(length(max = 1024))]
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductFilter {
    pub flavor_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockAdjustmentMode {
    Add,
    Subtract,
    Replace,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StockAdjustmentInput {
    pub mode: StockAdjustmentMode,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub reason: Option<String>,
}

fn validate_price(price: Decimal) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Removes `quantity` units unless that would take stock below zero.
/// The check and the write are a single statement.
pub(crate) async fn take_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = Product::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "product {} has fewer than {} units in stock",
            product_id, quantity
        )));
    }
    Ok(())
}

pub(crate) async fn return_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    Product::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Flavors, products and stock.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    cache: TtlCache,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, cache: TtlCache) -> Self {
        Self { db, cache }
    }

    fn invalidate(&self) {
        self.cache.invalidate_prefix(keys::CATALOG);
    }

    // Flavors

    #[instrument(skip(self))]
    pub async fn list_flavors(&self, active_only: bool) -> Result<Vec<FlavorModel>, ServiceError> {
        if !active_only {
            return Ok(Flavor::find()
                .order_by_asc(flavor::Column::Name)
                .all(&*self.db)
                .await?);
        }

        self.cache
            .get_or_load(keys::FLAVORS, || async {
                Ok::<_, ServiceError>(
                    Flavor::find()
                        .filter(flavor::Column::IsActive.eq(true))
                        .order_by_asc(flavor::Column::Name)
                        .all(&*self.db)
                        .await?,
                )
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_flavor(&self, id: Uuid) -> Result<FlavorModel, ServiceError> {
        Flavor::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Flavor", id))
    }

    #[instrument(skip(self))]
    pub async fn create_flavor(&self, input: CreateFlavorInput) -> Result<FlavorModel, ServiceError> {
        input.validate()?;
        self.ensure_flavor_name_free(&input.name, None).await?;

        let now = Utc::now();
        let flavor = flavor::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.invalidate();
        info!(flavor_id = %flavor.id, "flavor created");
        Ok(flavor)
    }

    #[instrument(skip(self))]
    pub async fn update_flavor(
        &self,
        id: Uuid,
        input: UpdateFlavorInput,
    ) -> Result<FlavorModel, ServiceError> {
        input.validate()?;
        let existing = self.get_flavor(id).await?;
        if let Some(name) = &input.name {
            self.ensure_flavor_name_free(name, Some(id)).await?;
        }

        let mut flavor: flavor::ActiveModel = existing.into();
        if let Some(name) = input.name {
            flavor.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            flavor.description = Set(Some(description));
        }
        if let Some(is_active) = input.is_active {
            flavor.is_active = Set(is_active);
        }
        flavor.updated_at = Set(Utc::now());
        let flavor = flavor.update(&*self.db).await?;

        self.invalidate();
        Ok(flavor)
    }

    #[instrument(skip(self))]
    pub async fn delete_flavor(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_flavor(id).await?;

        let products = Product::find()
            .filter(product::Column::FlavorId.eq(id))
            .count(&*self.db)
            .await?;
        if products > 0 {
            return Err(ServiceError::Conflict(format!(
                "flavor {} is used by {} products",
                id, products
            )));
        }

        Flavor::delete_by_id(id).exec(&*self.db).await?;
        self.invalidate();
        info!(flavor_id = %id, "flavor deleted");
        Ok(())
    }

    async fn ensure_flavor_name_free(
        &self,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Flavor::find().filter(flavor::Column::Name.eq(name.trim()));
        if let Some(id) = except {
            query = query.filter(flavor::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "flavor '{}' already exists",
                name.trim()
            )));
        }
        Ok(())
    }

    // Products

    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> Result<Vec<ProductModel>, ServiceError> {
        if !filter.active_only {
            return self.query_products(&filter).await;
        }

        let key = format!(
            "{}:{}:{}",
            keys::PRODUCTS,
            filter.flavor_id.map(|id| id.to_string()).unwrap_or_default(),
            filter.search.as_deref().unwrap_or_default().to_lowercase()
        );
        self.cache
            .get_or_load(&key, || self.query_products(&filter))
            .await
    }

    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<ProductModel>, ServiceError> {
        let mut query = Product::find();
        if filter.active_only {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        if let Some(flavor_id) = filter.flavor_id {
            query = query.filter(product::Column::FlavorId.eq(flavor_id));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(product::Column::Name.contains(search));
        }

        Ok(query
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }

    /// Storefront lookup; inactive products are reported as missing
    #[instrument(skip(self))]
    pub async fn get_active_product(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = self.get_product(id).await?;
        if !product.is_active {
            return Err(ServiceError::not_found("Product", id));
        }
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn create_product(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        validate_price(input.price)?;
        if let Some(flavor_id) = input.flavor_id {
            self.get_flavor(flavor_id).await?;
        }

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            flavor_id: Set(input.flavor_id),
            price: Set(input.price),
            stock_quantity: Set(input.stock_quantity),
            image_url: Set(input.image_url),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.invalidate();
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        let existing = self.get_product(id).await?;

        let mut product: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            product.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            product.description = Set(Some(description));
        }
        if let Some(flavor_id) = input.flavor_id {
            self.get_flavor(flavor_id).await?;
            product.flavor_id = Set(Some(flavor_id));
        }
        if let Some(price) = input.price {
            validate_price(price)?;
            product.price = Set(price);
        }
        if let Some(image_url) = input.image_url {
            product.image_url = Set(Some(image_url));
        }
        if let Some(is_active) = input.is_active {
            product.is_active = Set(is_active);
        }
        product.updated_at = Set(Utc::now());
        let product = product.update(&*self.db).await?;

        self.invalidate();
        Ok(product)
    }

    /// Products that were ever ordered stay for the order history; deactivate them instead
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_product(id).await?;

        let ordered = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(id))
            .count(&*self.db)
            .await?;
        if ordered > 0 {
            return Err(ServiceError::Conflict(format!(
                "product {} appears in {} order lines; deactivate it instead",
                id, ordered
            )));
        }

        let txn = self.db.begin().await?;
        let dropped = CartItem::delete_many()
            .filter(cart_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?
            .rows_affected;
        Product::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        self.invalidate();
        info!(product_id = %id, cart_lines = dropped, "product deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        id: Uuid,
        input: StockAdjustmentInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;
        let before = product.stock_quantity;

        match input.mode {
            StockAdjustmentMode::Add => return_stock(&txn, id, input.quantity).await?,
            StockAdjustmentMode::Subtract => take_stock(&txn, id, input.quantity).await?,
            StockAdjustmentMode::Replace => {
                let mut product: product::ActiveModel = product.into();
                product.stock_quantity = Set(input.quantity);
                product.updated_at = Set(Utc::now());
                product.update(&txn).await?;
            }
        }

        let product = Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;
        txn.commit().await?;

        self.invalidate();
        info!(
            product_id = %id,
            mode = ?input.mode,
            quantity = input.quantity,
            before,
            after = product.stock_quantity,
            reason = input.reason.as_deref().unwrap_or(""),
            "stock adjusted"
        );
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn service() -> CatalogService {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        CatalogService::new(Arc::new(db), TtlCache::default())
    }

    fn product_input(name: &str, stock: i32) -> CreateProductInput {
        CreateProductInput {
            name: name.into(),
            description: None,
            flavor_id: None,
            price: dec!(2.50),
            stock_quantity: stock,
            image_url: None,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn subtract_below_zero_is_rejected_and_stock_unchanged() {
        let catalog = service().await;
        let product = catalog.create_product(product_input("Chunky", 3)).await.unwrap();

        let result = catalog
            .adjust_stock(
                product.id,
                StockAdjustmentInput {
                    mode: StockAdjustmentMode::Subtract,
                    quantity: 4,
                    reason: None,
                },
            )
            .await;

        assert_matches!(result, Err(ServiceError::InsufficientStock(_)));
        assert_eq!(catalog.get_product(product.id).await.unwrap().stock_quantity, 3);
    }

    #[tokio::test]
    async fn stock_modes_add_subtract_replace() {
        let catalog = service().await;
        let product = catalog.create_product(product_input("Oat", 5)).await.unwrap();

        let adjust = |mode, quantity| StockAdjustmentInput {
            mode,
            quantity,
            reason: Some("count".into()),
        };

        let p = catalog
            .adjust_stock(product.id, adjust(StockAdjustmentMode::Add, 3))
            .await
            .unwrap();
        assert_eq!(p.stock_quantity, 8);
        let p = catalog
            .adjust_stock(product.id, adjust(StockAdjustmentMode::Subtract, 8))
            .await
            .unwrap();
        assert_eq!(p.stock_quantity, 0);
        let p = catalog
            .adjust_stock(product.id, adjust(StockAdjustmentMode::Replace, 12))
            .await
            .unwrap();
        assert_eq!(p.stock_quantity, 12);
    }

    #[tokio::test]
    async fn flavor_in_use_cannot_be_deleted() {
        let catalog = service().await;
        let flavor = catalog
            .create_flavor(CreateFlavorInput {
                name: "Double Chocolate".into(),
                description: None,
                is_active: None,
            })
            .await
            .unwrap();
        let mut input = product_input("Fudge", 1);
        input.flavor_id = Some(flavor.id);
        catalog.create_product(input).await.unwrap();

        assert_matches!(
            catalog.delete_flavor(flavor.id).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn duplicate_flavor_name_conflicts() {
        let catalog = service().await;
        let input = CreateFlavorInput {
            name: "Vanilla".into(),
            description: None,
            is_active: None,
        };
        catalog.create_flavor(input.clone()).await.unwrap();
        assert_matches!(
            catalog.create_flavor(input).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn storefront_listing_hides_inactive_and_refreshes_after_update() {
        let catalog = service().await;
        let visible = catalog.create_product(product_input("Sugar", 1)).await.unwrap();
        let mut hidden = product_input("Secret", 1);
        hidden.is_active = Some(false);
        catalog.create_product(hidden).await.unwrap();

        let storefront = ProductFilter {
            active_only: true,
            ..Default::default()
        };
        let listed = catalog.list_products(storefront.clone()).await.unwrap();
        assert_eq!(listed.len(), 1);

        catalog
            .update_product(
                visible.id,
                UpdateProductInput {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(catalog.list_products(storefront).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_positive_price_is_rejected() {
        let catalog = service().await;
        let mut input = product_input("Free", 1);
        input.price = Decimal::ZERO;
        assert_matches!(
            catalog.create_product(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
