use std::sync::Arc;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthService, TokenResponse};
use crate::db::DbPool;
use crate::entities::{inventory_log, user};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: user::Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUser {
    pub role: Option<user::Role>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPassword {
    #[validate(length(min = 8))]
    pub new_password: String,
}

/// Account management and credential verification.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    auth: AuthService,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, auth: AuthService) -> Self {
        Self { db, auth }
    }

    /// Verify credentials and issue a bearer token. Unknown usernames and bad
    /// passwords produce the same error.
    #[instrument(skip(self, credentials))]
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> Result<TokenResponse, ServiceError> {
        credentials.validate()?;

        let account = user::Entity::find()
            .filter(user::Column::Username.eq(&credentials.username))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::AuthError("Invalid username or password".to_string()))?;

        if !verify_password(&credentials.password, &account.hashed_password) {
            return Err(ServiceError::AuthError(
                "Invalid username or password".to_string(),
            ));
        }
        if account.disabled {
            return Err(ServiceError::Forbidden("Account is disabled".to_string()));
        }

        info!(user_id = account.id, "user authenticated");
        self.auth.issue_token(&account)
    }

    #[instrument(skip(self, payload))]
    pub async fn create_user(&self, payload: NewUser) -> Result<user::Model, ServiceError> {
        payload.validate()?;

        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(&payload.username))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                payload.username
            )));
        }

        let account = user::ActiveModel {
            username: Set(payload.username),
            hashed_password: Set(hash_password(&payload.password)),
            role: Set(payload.role),
            disabled: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = account.id, "user created");
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i32) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    #[instrument(skip(self, payload))]
    pub async fn update_user(
        &self,
        id: i32,
        payload: UpdateUser,
    ) -> Result<user::Model, ServiceError> {
        payload.validate()?;
        let account = self.get_user(id).await?;

        let mut active: user::ActiveModel = account.into();
        if let Some(role) = payload.role {
            active.role = Set(role);
        }
        if let Some(disabled) = payload.disabled {
            active.disabled = Set(disabled);
        }
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self, payload))]
    pub async fn reset_password(
        &self,
        id: i32,
        payload: ResetPassword,
    ) -> Result<(), ServiceError> {
        payload.validate()?;
        let account = self.get_user(id).await?;

        let mut active: user::ActiveModel = account.into();
        active.hashed_password = Set(hash_password(&payload.new_password));
        active.update(&*self.db).await?;

        info!(user_id = id, "password reset");
        Ok(())
    }

    /// Delete an account. Refused while inventory logs still reference it so
    /// the audit trail keeps a valid actor.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: i32) -> Result<(), ServiceError> {
        let account = self.get_user(id).await?;

        let log_refs = inventory_log::Entity::find()
            .filter(inventory_log::Column::ChangedBy.eq(id))
            .count(&*self.db)
            .await?;
        if log_refs > 0 {
            return Err(ServiceError::ValidationError(format!(
                "User {} has {} inventory log entries and cannot be deleted",
                id, log_refs
            )));
        }

        user::Entity::delete_by_id(account.id).exec(&*self.db).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }
}
