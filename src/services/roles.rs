use std::str::FromStr;
use std::sync::Arc;

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{staff_role, user};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewStaffRole {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub responsibilities: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStaffRole {
    pub responsibilities: Option<Vec<String>>,
    pub permissions: Option<Vec<String>>,
}

/// HR's descriptive role catalogue.
#[derive(Clone)]
pub struct StaffRoleService {
    db: Arc<DbPool>,
}

impl StaffRoleService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_role(
        &self,
        payload: NewStaffRole,
    ) -> Result<staff_role::Model, ServiceError> {
        payload.validate()?;

        let existing = staff_role::Entity::find()
            .filter(staff_role::Column::Name.eq(&payload.name))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Role '{}' already exists",
                payload.name
            )));
        }

        let created = staff_role::ActiveModel {
            name: Set(payload.name),
            responsibilities: Set(serde_json::json!(payload.responsibilities)),
            permissions: Set(serde_json::json!(payload.permissions)),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(role_id = created.id, "staff role created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_roles(&self) -> Result<Vec<staff_role::Model>, ServiceError> {
        Ok(staff_role::Entity::find()
            .order_by_asc(staff_role::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_role(&self, id: i32) -> Result<staff_role::Model, ServiceError> {
        staff_role::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Staff role {} not found", id)))
    }

    #[instrument(skip(self, payload))]
    pub async fn update_role(
        &self,
        id: i32,
        payload: UpdateStaffRole,
    ) -> Result<staff_role::Model, ServiceError> {
        payload.validate()?;
        let existing = self.get_role(id).await?;

        let mut active: staff_role::ActiveModel = existing.into();
        if let Some(responsibilities) = payload.responsibilities {
            active.responsibilities = Set(serde_json::json!(responsibilities));
        }
        if let Some(permissions) = payload.permissions {
            active.permissions = Set(serde_json::json!(permissions));
        }
        Ok(active.update(&*self.db).await?)
    }

    /// Refused while accounts still hold the role. Catalogue names that do
    /// not correspond to an account-level role cannot be held by anyone.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.get_role(id).await?;

        if let Ok(account_role) = user::Role::from_str(&existing.name) {
            let holders = user::Entity::find()
                .filter(user::Column::Role.eq(account_role))
                .count(&*self.db)
                .await?;
            if holders > 0 {
                return Err(ServiceError::ValidationError(format!(
                    "{} users still hold the role '{}'",
                    holders, existing.name
                )));
            }
        }

        staff_role::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(role_id = id, "staff role deleted");
        Ok(())
    }
}
