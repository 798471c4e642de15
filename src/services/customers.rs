use std::sync::Arc;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, QuerySelect, Set};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{customer, order};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub preferences: Option<JsonValue>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomer {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub preferences: Option<JsonValue>,
}

/// Customer directory CRUD plus per-customer order history.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_customer(
        &self,
        payload: NewCustomer,
    ) -> Result<customer::Model, ServiceError> {
        payload.validate()?;

        let existing = customer::Entity::find()
            .filter(customer::Column::Email.eq(&payload.email))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A customer with email '{}' already exists",
                payload.email
            )));
        }

        let created = customer::ActiveModel {
            first_name: Set(payload.first_name),
            last_name: Set(payload.last_name),
            email: Set(payload.email),
            phone: Set(payload.phone),
            preferences: Set(payload.preferences.unwrap_or_else(|| JsonValue::Object(Default::default()))),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(customer_id = created.id, "customer created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<customer::Model>, ServiceError> {
        Ok(customer::Entity::find()
            .order_by_asc(customer::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: i32) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Customer {} not found", id)))
    }

    #[instrument(skip(self, payload))]
    pub async fn update_customer(
        &self,
        id: i32,
        payload: UpdateCustomer,
    ) -> Result<customer::Model, ServiceError> {
        payload.validate()?;
        let existing = self.get_customer(id).await?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(first_name) = payload.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = payload.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(email) = payload.email {
            active.email = Set(email);
        }
        if let Some(phone) = payload.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(preferences) = payload.preferences {
            active.preferences = Set(preferences);
        }
        Ok(active.update(&*self.db).await?)
    }

    /// Refused while the customer still has orders on file.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.get_customer(id).await?;

        let order_count = order::Entity::find()
            .filter(order::Column::CustomerId.eq(id))
            .count(&*self.db)
            .await?;
        if order_count > 0 {
            return Err(ServiceError::ValidationError(format!(
                "Customer {} has {} orders and cannot be deleted",
                id, order_count
            )));
        }

        customer::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(customer_id = id, "customer deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn customer_orders(&self, id: i32) -> Result<Vec<order::Model>, ServiceError> {
        // 404 before an empty list so missing customers are distinguishable.
        self.get_customer(id).await?;

        Ok(order::Entity::find()
            .filter(order::Column::CustomerId.eq(id))
            .order_by_desc(order::Column::PlacedAt)
            .all(&*self.db)
            .await?)
    }
}
