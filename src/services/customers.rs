use crate::{
    entities::{customer, Customer, CustomerModel, Zone},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use sea_orm::sea_query::Condition;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1))]
    pub address: Option<String>,
    pub zone_id: Option<Uuid>,
}

/// Normalises an international number to `+digits`.
/// Spaces, dashes, dots and brackets are dropped; the leading `+` and 7 to 15 digits
/// are required so that one phone has exactly one spelling.
pub fn normalize_phone(raw: &str) -> Result<String, ServiceError> {
    let invalid = || ServiceError::ValidationError(format!("invalid phone number '{}'", raw));
    let rest = raw.trim().strip_prefix('+').ok_or_else(invalid)?;

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(invalid()),
        }
    }
    if !(7..=15).contains(&digits.len()) {
        return Err(invalid());
    }
    Ok(format!("+{}", digits))
}

/// Finds the customer for a verified phone or creates one
pub(crate) async fn upsert_verified<C: ConnectionTrait>(
    conn: &C,
    phone: &str,
) -> Result<CustomerModel, ServiceError> {
    let now = Utc::now();
    let existing = Customer::find()
        .filter(customer::Column::Phone.eq(phone))
        .one(conn)
        .await?;

    match existing {
        Some(found) if found.phone_verified => Ok(found),
        Some(found) => {
            let mut active: customer::ActiveModel = found.into();
            active.phone_verified = Set(true);
            active.updated_at = Set(now);
            Ok(active.update(conn).await?)
        }
        None => {
            let created = customer::ActiveModel {
                id: Set(Uuid::new_v4()),
                phone: Set(phone.to_string()),
                name: Set(None),
                email: Set(None),
                address: Set(None),
                zone_id: Set(None),
                phone_verified: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
            info!(customer_id = %created.id, "customer registered");
            Ok(created)
        }
    }
}

#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: Uuid) -> Result<CustomerModel, ServiceError> {
        Customer::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<CustomerModel, ServiceError> {
        input.validate()?;
        let mut customer: customer::ActiveModel = self.get_customer(id).await?.into();

        if let Some(zone_id) = input.zone_id {
            Zone::find_by_id(zone_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Zone", zone_id))?;
            customer.zone_id = Set(Some(zone_id));
        }
        if let Some(name) = input.name {
            customer.name = Set(Some(name.trim().to_string()));
        }
        if let Some(email) = input.email {
            customer.email = Set(Some(email.trim().to_lowercase()));
        }
        if let Some(address) = input.address {
            customer.address = Set(Some(address));
        }
        customer.updated_at = Set(Utc::now());
        Ok(customer.update(&*self.db).await?)
    }

    /// Back office listing, newest first, optionally matching phone, name or email
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        search: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<CustomerModel>, u64), ServiceError> {
        let mut query = Customer::find();
        if let Some(term) = search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(customer::Column::Phone.contains(term))
                    .add(customer::Column::Name.contains(term))
                    .add(customer::Column::Email.contains(term)),
            );
        }

        let paginator = query
            .order_by_desc(customer::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((customers, total))
    }
}
