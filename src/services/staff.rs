use crate::{
    auth::password::{hash_password, verify_against_dummy, verify_password},
    entities::{staff_user, Kitchen, StaffRole, StaffUser, StaffUserModel},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateStaffInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: StaffRole,
    pub kitchen_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStaffInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
    pub role: Option<StaffRole>,
    pub kitchen_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Back office and kitchen accounts.
#[derive(Clone)]
pub struct StaffService {
    db: Arc<DatabaseConnection>,
}

impl StaffService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Email and password sign-in. Unknown, inactive and wrong-password accounts all
    /// yield the same error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<StaffUserModel, ServiceError> {
        let invalid = || ServiceError::Unauthorized("invalid email or password".to_string());
        let email = email.trim().to_lowercase();

        let Some(staff) = StaffUser::find()
            .filter(staff_user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?
        else {
            verify_against_dummy(password);
            warn!(email = %email, "login for unknown staff account");
            return Err(invalid());
        };

        if !staff.is_active || !verify_password(password, &staff.password_hash)? {
            warn!(staff_id = %staff.id, "staff login rejected");
            return Err(invalid());
        }

        info!(staff_id = %staff.id, role = %staff.role, "staff signed in");
        Ok(staff)
    }

    #[instrument(skip(self))]
    pub async fn list_staff(&self) -> Result<Vec<StaffUserModel>, ServiceError> {
        Ok(StaffUser::find()
            .order_by_asc(staff_user::Column::Email)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_staff(&self, id: Uuid) -> Result<StaffUserModel, ServiceError> {
        StaffUser::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Staff user", id))
    }

    async fn check_assignment(&self, role: StaffRole, kitchen_id: Option<Uuid>) -> Result<(), ServiceError> {
        match (role, kitchen_id) {
            (StaffRole::Kitchen, None) => Err(ServiceError::ValidationError(
                "kitchen staff must be assigned to a kitchen".to_string(),
            )),
            (_, Some(kitchen_id)) => Kitchen::find_by_id(kitchen_id)
                .one(&*self.db)
                .await?
                .map(|_| ())
                .ok_or_else(|| ServiceError::not_found("Kitchen", kitchen_id)),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn create_staff(&self, input: CreateStaffInput) -> Result<StaffUserModel, ServiceError> {
        input.validate()?;
        self.check_assignment(input.role, input.kitchen_id).await?;

        let email = input.email.trim().to_lowercase();
        let taken = StaffUser::find()
            .filter(staff_user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!("staff account {} already exists", email)));
        }

        let now = Utc::now();
        let staff = staff_user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            name: Set(input.name.trim().to_string()),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(input.role),
            kitchen_id: Set(input.kitchen_id),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(staff_id = %staff.id, "staff account created");
        Ok(staff)
    }

    #[instrument(skip(self, input))]
    pub async fn update_staff(
        &self,
        id: Uuid,
        acting_staff_id: Uuid,
        input: UpdateStaffInput,
    ) -> Result<StaffUserModel, ServiceError> {
        input.validate()?;
        let existing = self.get_staff(id).await?;
        if id == acting_staff_id && (input.is_active == Some(false) || input.role == Some(StaffRole::Kitchen)) {
            return Err(ServiceError::InvalidOperation(
                "you cannot deactivate or demote your own account".to_string(),
            ));
        }

        let role = input.role.unwrap_or(existing.role);
        let kitchen_id = input.kitchen_id.or(existing.kitchen_id);
        self.check_assignment(role, kitchen_id).await?;

        let mut staff: staff_user::ActiveModel = existing.into();
        staff.role = Set(role);
        staff.kitchen_id = Set(kitchen_id);
        if let Some(name) = input.name {
            staff.name = Set(name.trim().to_string());
        }
        if let Some(password) = input.password {
            staff.password_hash = Set(hash_password(&password)?);
        }
        if let Some(is_active) = input.is_active {
            staff.is_active = Set(is_active);
        }
        staff.updated_at = Set(Utc::now());
        Ok(staff.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, id: Uuid, acting_staff_id: Uuid, is_active: bool) -> Result<StaffUserModel, ServiceError> {
        self.update_staff(
            id,
            acting_staff_id,
            UpdateStaffInput {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_staff(&self, id: Uuid, acting_staff_id: Uuid) -> Result<(), ServiceError> {
        if id == acting_staff_id {
            return Err(ServiceError::InvalidOperation(
                "you cannot delete your own account".to_string(),
            ));
        }
        self.get_staff(id).await?;
        StaffUser::delete_by_id(id).exec(&*self.db).await?;
        info!(staff_id = %id, "staff account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use assert_matches::assert_matches;

    async fn service() -> StaffService {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        StaffService::new(Arc::new(db))
    }

    fn admin_input() -> CreateStaffInput {
        CreateStaffInput {
            email: "Owner@Example.com".into(),
            name: "Owner".into(),
            password: "correct horse".into(),
            role: StaffRole::Admin,
            kitchen_id: None,
        }
    }

    #[tokio::test]
    async fn login_checks_password_and_active_flag() {
        let staff = service().await;
        let admin = staff.create_staff(admin_input()).await.unwrap();
        assert_eq!(admin.email, "owner@example.com");

        assert_eq!(staff.login("owner@example.com", "correct horse").await.unwrap().id, admin.id);
        assert_matches!(
            staff.login("owner@example.com", "wrong horse").await,
            Err(ServiceError::Unauthorized(_))
        );

        let other = Uuid::new_v4();
        staff.set_active(admin.id, other, false).await.unwrap();
        assert_matches!(
            staff.login("owner@example.com", "correct horse").await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn unknown_email_gets_the_same_error_as_a_wrong_password() {
        let staff = service().await;
        staff.create_staff(admin_input()).await.unwrap();

        let unknown = staff.login("nobody@example.com", "correct horse").await;
        let wrong = staff.login("owner@example.com", "wrong horse").await;
        match (unknown, wrong) {
            (Err(ServiceError::Unauthorized(a)), Err(ServiceError::Unauthorized(b))) => {
                assert_eq!(a, b)
            }
            other => panic!("expected two identical rejections, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn kitchen_staff_need_a_kitchen() {
        let staff = service().await;
        let mut input = admin_input();
        input.role = StaffRole::Kitchen;
        assert_matches!(
            staff.create_staff(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_self_delete_is_refused() {
        let staff = service().await;
        let admin = staff.create_staff(admin_input()).await.unwrap();
        assert_matches!(
            staff.create_staff(admin_input()).await,
            Err(ServiceError::Conflict(_))
        );
        assert_matches!(
            staff.delete_staff(admin.id, admin.id).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }
}
