use crate::{
    entities::{
        delivery_man, kitchen, staff_user, zone, DeliveryMan, DeliveryManModel, Kitchen,
        KitchenModel, StaffUser, Zone,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateKitchenInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateKitchenInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDeliveryManInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 3, max = 32))]
    pub phone: String,
    pub kitchen_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDeliveryManInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 32))]
    pub phone: Option<String>,
    pub kitchen_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Kitchens and the couriers attached to them.
#[derive(Clone)]
pub struct KitchenService {
    db: Arc<DatabaseConnection>,
}

impl KitchenService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_kitchens(&self) -> Result<Vec<KitchenModel>, ServiceError> {
        Ok(Kitchen::find()
            .order_by_asc(kitchen::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_kitchen(&self, id: Uuid) -> Result<KitchenModel, ServiceError> {
        Kitchen::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Kitchen", id))
    }

    #[instrument(skip(self))]
    pub async fn create_kitchen(&self, input: CreateKitchenInput) -> Result<KitchenModel, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let kitchen = kitchen::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            address: Set(input.address),
            phone: Set(input.phone),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(kitchen_id = %kitchen.id, "kitchen created");
        Ok(kitchen)
    }

    #[instrument(skip(self))]
    pub async fn update_kitchen(
        &self,
        id: Uuid,
        input: UpdateKitchenInput,
    ) -> Result<KitchenModel, ServiceError> {
        input.validate()?;
        let mut kitchen: kitchen::ActiveModel = self.get_kitchen(id).await?.into();
        if let Some(name) = input.name {
            kitchen.name = Set(name.trim().to_string());
        }
        if let Some(address) = input.address {
            kitchen.address = Set(address);
        }
        if let Some(phone) = input.phone {
            kitchen.phone = Set(Some(phone));
        }
        if let Some(is_active) = input.is_active {
            kitchen.is_active = Set(is_active);
        }
        kitchen.updated_at = Set(Utc::now());
        Ok(kitchen.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_kitchen(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_kitchen(id).await?;

        let zones = Zone::find()
            .filter(zone::Column::KitchenId.eq(id))
            .count(&*self.db)
            .await?;
        let staff = StaffUser::find()
            .filter(staff_user::Column::KitchenId.eq(id))
            .count(&*self.db)
            .await?;
        if zones > 0 || staff > 0 {
            return Err(ServiceError::Conflict(format!(
                "kitchen {} is referenced by {} zones and {} staff accounts",
                id, zones, staff
            )));
        }

        Kitchen::delete_by_id(id).exec(&*self.db).await?;
        info!(kitchen_id = %id, "kitchen deleted");
        Ok(())
    }

    // Delivery men

    #[instrument(skip(self))]
    pub async fn list_delivery_men(
        &self,
        kitchen_id: Option<Uuid>,
        active_only: bool,
    ) -> Result<Vec<DeliveryManModel>, ServiceError> {
        let mut query = DeliveryMan::find();
        if let Some(kitchen_id) = kitchen_id {
            query = query.filter(delivery_man::Column::KitchenId.eq(kitchen_id));
        }
        if active_only {
            query = query.filter(delivery_man::Column::IsActive.eq(true));
        }
        Ok(query
            .order_by_asc(delivery_man::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_delivery_man(&self, id: Uuid) -> Result<DeliveryManModel, ServiceError> {
        DeliveryMan::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery man", id))
    }

    #[instrument(skip(self))]
    pub async fn create_delivery_man(
        &self,
        input: CreateDeliveryManInput,
    ) -> Result<DeliveryManModel, ServiceError> {
        input.validate()?;
        if let Some(kitchen_id) = input.kitchen_id {
            self.get_kitchen(kitchen_id).await?;
        }

        let now = Utc::now();
        let courier = delivery_man::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            phone: Set(input.phone.trim().to_string()),
            kitchen_id: Set(input.kitchen_id),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(delivery_man_id = %courier.id, "delivery man created");
        Ok(courier)
    }

    #[instrument(skip(self))]
    pub async fn update_delivery_man(
        &self,
        id: Uuid,
        input: UpdateDeliveryManInput,
    ) -> Result<DeliveryManModel, ServiceError> {
        input.validate()?;
        let mut courier: delivery_man::ActiveModel = self.get_delivery_man(id).await?.into();
        if let Some(name) = input.name {
            courier.name = Set(name.trim().to_string());
        }
        if let Some(phone) = input.phone {
            courier.phone = Set(phone.trim().to_string());
        }
        if let Some(kitchen_id) = input.kitchen_id {
            self.get_kitchen(kitchen_id).await?;
            courier.kitchen_id = Set(Some(kitchen_id));
        }
        if let Some(is_active) = input.is_active {
            courier.is_active = Set(is_active);
        }
        courier.updated_at = Set(Utc::now());
        Ok(courier.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_delivery_man(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get_delivery_man(id).await?;
        DeliveryMan::delete_by_id(id).exec(&*self.db).await?;
        info!(delivery_man_id = %id, "delivery man deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::StaffRole;
    use assert_matches::assert_matches;

    async fn service() -> KitchenService {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        KitchenService::new(Arc::new(db))
    }

    fn kitchen_input() -> CreateKitchenInput {
        CreateKitchenInput {
            name: "Central Bakery".into(),
            address: "1 Oven Street".into(),
            phone: None,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn kitchen_with_staff_cannot_be_deleted() {
        let kitchens = service().await;
        let kitchen = kitchens.create_kitchen(kitchen_input()).await.unwrap();

        let now = Utc::now();
        staff_user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set("baker@example.com".into()),
            name: Set("Baker".into()),
            password_hash: Set("x".into()),
            role: Set(StaffRole::Kitchen),
            kitchen_id: Set(Some(kitchen.id)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*kitchens.db)
        .await
        .unwrap();

        assert_matches!(
            kitchens.delete_kitchen(kitchen.id).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn delivery_men_filter_by_kitchen() {
        let kitchens = service().await;
        let kitchen = kitchens.create_kitchen(kitchen_input()).await.unwrap();

        kitchens
            .create_delivery_man(CreateDeliveryManInput {
                name: "Ann".into(),
                phone: "+15550001".into(),
                kitchen_id: Some(kitchen.id),
                is_active: None,
            })
            .await
            .unwrap();
        kitchens
            .create_delivery_man(CreateDeliveryManInput {
                name: "Bob".into(),
                phone: "+15550002".into(),
                kitchen_id: None,
                is_active: None,
            })
            .await
            .unwrap();

        let own = kitchens.list_delivery_men(Some(kitchen.id), true).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].name, "Ann");
        assert_eq!(kitchens.list_delivery_men(None, false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn courier_for_unknown_kitchen_is_not_found() {
        let kitchens = service().await;
        let result = kitchens
            .create_delivery_man(CreateDeliveryManInput {
                name: "Cy".into(),
                phone: "+15550003".into(),
                kitchen_id: Some(Uuid::new_v4()),
                is_active: None,
            })
            .await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }
}
