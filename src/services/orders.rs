use crate::{
    cache::{keys, TtlCache},
    entities::{
        delivery_man, order, order_item, Customer, DeliveryMan, Order, OrderItem, OrderItemModel,
        OrderModel, OrderStatus, PaymentStatus,
    },
    errors::ServiceError,
    services::{catalog::return_stock, notifications::Notifier},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Order header with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub kitchen_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignDeliveryManInput {
    pub delivery_man_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusInput {
    pub payment_status: PaymentStatus,
}

/// Back office summary for one delivery day
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub date: NaiveDate,
    pub total_orders: u64,
    pub orders_by_status: BTreeMap<String, u64>,
    /// Sum of totals of delivered or paid orders that were not cancelled
    #[schema(value_type = String)]
    pub revenue: Decimal,
    pub unassigned_orders: u64,
}

pub fn summarize(date: NaiveDate, orders: &[OrderModel]) -> DashboardSummary {
    let mut orders_by_status = BTreeMap::new();
    let mut revenue = Decimal::ZERO;
    let mut unassigned_orders = 0;

    for order in orders {
        *orders_by_status.entry(order.status.to_string()).or_insert(0) += 1;
        if order.status == OrderStatus::Cancelled {
            continue;
        }
        if order.status == OrderStatus::Delivered || order.payment_status == PaymentStatus::Paid {
            revenue += order.total;
        }
        if order.delivery_man_id.is_none() && !order.status.is_terminal() {
            unassigned_orders += 1;
        }
    }

    DashboardSummary {
        date,
        total_orders: orders.len() as u64,
        orders_by_status,
        revenue,
        unassigned_orders,
    }
}

pub(crate) async fn load_details<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> Result<OrderDetails, ServiceError> {
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::ProductName)
        .all(conn)
        .await?;
    Ok(OrderDetails { order, items })
}

/// Order lookups and the fulfillment lifecycle for customers, the back office and kitchens
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    notifier: Notifier,
    cache: TtlCache,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, notifier: Notifier, cache: TtlCache) -> Self {
        Self { db, notifier, cache }
    }

    async fn find_order(&self, id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))
    }

    // Customer

    #[instrument(skip(self))]
    pub async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Someone else's order number reads as not found
    #[instrument(skip(self))]
    pub async fn get_for_customer(
        &self,
        customer_id: Uuid,
        order_number: &str,
    ) -> Result<OrderDetails, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        load_details(&*self.db, order).await
    }

    // Back office

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = Order::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(kitchen_id) = filter.kitchen_id {
            query = query.filter(order::Column::KitchenId.eq(kitchen_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        if let Some(date) = filter.delivery_date {
            query = query.filter(order::Column::DeliveryDate.eq(date));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = self.find_order(id).await?;
        load_details(&*self.db, order).await
    }

    /// Moves an order along its lifecycle. Cancelling puts the ordered units back in stock
    /// in the same transaction.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, next: OrderStatus) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = Order::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;

        if !order.status.can_transition_to(next) {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} cannot go from {} to {}",
                order.order_number, order.status, next
            )));
        }

        if next == OrderStatus::Cancelled {
            let items = OrderItem::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .all(&txn)
                .await?;
            for item in &items {
                return_stock(&txn, item.product_id, item.quantity).await?;
            }
            if order.payment_status == PaymentStatus::Paid {
                warn!(order_number = %order.order_number, "paid order cancelled, refund it at the gateway");
            }
        }

        let previous = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;
        txn.commit().await?;
        if next == OrderStatus::Cancelled {
            // listings carry stock levels
            self.cache.invalidate_prefix(keys::PRODUCTS);
        }

        info!(order_number = %order.order_number, from = %previous, to = %next, "order status changed");
        self.notify_status(&order).await;
        Ok(order)
    }

    async fn notify_status(&self, order: &OrderModel) {
        match Customer::find_by_id(order.customer_id).one(&*self.db).await {
            Ok(Some(customer)) => self.notifier.order_status_changed(order, &customer.phone).await,
            Ok(None) => warn!(order_number = %order.order_number, "order has no customer to notify"),
            Err(e) => warn!(error = %e, "could not load customer for notification"),
        }
    }

    #[instrument(skip(self))]
    pub async fn set_payment_status(
        &self,
        id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.find_order(id).await?;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(payment_status);
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;
        info!(order_number = %order.order_number, %payment_status, "payment status set by staff");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, date: NaiveDate) -> Result<DashboardSummary, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::DeliveryDate.eq(date))
            .all(&*self.db)
            .await?;
        Ok(summarize(date, &orders))
    }

    // Kitchen panel. `kitchen_scope` is `None` for admins, who see every kitchen.

    fn check_scope(order: &OrderModel, kitchen_scope: Option<Uuid>) -> Result<(), ServiceError> {
        match kitchen_scope {
            Some(kitchen_id) if order.kitchen_id != Some(kitchen_id) => Err(ServiceError::Forbidden(
                format!("order {} belongs to another kitchen", order.order_number),
            )),
            _ => Ok(()),
        }
    }

    /// Orders waiting on or moving through the kitchen, soonest delivery first
    #[instrument(skip(self))]
    pub async fn kitchen_queue(
        &self,
        kitchen_scope: Option<Uuid>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<OrderDetails>, ServiceError> {
        let mut query = Order::find().filter(order::Column::Status.is_in(OrderStatus::kitchen_queue()));
        if let Some(kitchen_id) = kitchen_scope {
            query = query.filter(order::Column::KitchenId.eq(kitchen_id));
        }
        if let Some(date) = date {
            query = query.filter(order::Column::DeliveryDate.eq(date));
        }
        let orders = query
            .order_by_asc(order::Column::DeliveryDate)
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(load_details(&*self.db, order).await?);
        }
        Ok(details)
    }

    #[instrument(skip(self))]
    pub async fn kitchen_update_status(
        &self,
        kitchen_scope: Option<Uuid>,
        id: Uuid,
        next: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        if !next.is_kitchen_settable() {
            return Err(ServiceError::Forbidden(format!(
                "kitchen staff cannot set orders to {}",
                next
            )));
        }
        let order = self.find_order(id).await?;
        Self::check_scope(&order, kitchen_scope)?;
        self.update_status(id, next).await
    }

    /// Hands an order to a courier. Kitchen staff may only use their own couriers.
    #[instrument(skip(self))]
    pub async fn assign_delivery_man(
        &self,
        kitchen_scope: Option<Uuid>,
        id: Uuid,
        delivery_man_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.find_order(id).await?;
        Self::check_scope(&order, kitchen_scope)?;
        if order.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is already {}",
                order.order_number, order.status
            )));
        }

        let courier = DeliveryMan::find()
            .filter(delivery_man::Column::Id.eq(delivery_man_id))
            .filter(delivery_man::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery man", delivery_man_id))?;
        if let Some(kitchen_id) = kitchen_scope {
            if courier.kitchen_id != Some(kitchen_id) {
                return Err(ServiceError::Forbidden(
                    "delivery man works for another kitchen".to_string(),
                ));
            }
        }

        let mut active: order::ActiveModel = order.into();
        active.delivery_man_id = Set(Some(courier.id));
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;
        info!(order_number = %order.order_number, delivery_man_id = %courier.id, "delivery man assigned");
        Ok(order)
    }
}
