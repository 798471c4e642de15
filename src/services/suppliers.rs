use std::sync::Arc;

use chrono::Utc;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{shipment, supplier};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewSupplier {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub contact_number: Option<String>,
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(length(min = 1))]
    pub zip_code: String,
    pub tree_types: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSupplier {
    /// Caller's view of the row; a mismatch means someone else updated it.
    pub version: i32,
    #[validate(email)]
    pub contact_email: Option<String>,
    pub contact_number: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub tree_types: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DbPool>,
}

impl SupplierService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_supplier(
        &self,
        payload: NewSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        payload.validate()?;

        let existing = supplier::Entity::find()
            .filter(supplier::Column::Name.eq(&payload.name))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Supplier '{}' already exists",
                payload.name
            )));
        }

        let created = supplier::ActiveModel {
            name: Set(payload.name),
            contact_email: Set(payload.contact_email),
            contact_number: Set(payload.contact_number),
            street: Set(payload.street),
            city: Set(payload.city),
            state: Set(payload.state),
            country: Set(payload.country),
            zip_code: Set(payload.zip_code),
            tree_types: Set(serde_json::json!(payload.tree_types)),
            version: Set(1),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(supplier_id = created.id, "supplier created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_suppliers(&self) -> Result<Vec<supplier::Model>, ServiceError> {
        Ok(supplier::Entity::find()
            .order_by_asc(supplier::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_supplier(&self, id: i32) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))
    }

    /// Optimistic update: the caller's version must match the stored one, and
    /// the write bumps it.
    #[instrument(skip(self, payload))]
    pub async fn update_supplier(
        &self,
        id: i32,
        payload: UpdateSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        payload.validate()?;
        let existing = self.get_supplier(id).await?;

        if existing.version != payload.version {
            return Err(ServiceError::Conflict(format!(
                "Supplier {} was modified concurrently (version {} expected, {} given)",
                id, existing.version, payload.version
            )));
        }

        let next_version = existing.version + 1;
        let mut active: supplier::ActiveModel = existing.into();
        if let Some(contact_email) = payload.contact_email {
            active.contact_email = Set(Some(contact_email));
        }
        if let Some(contact_number) = payload.contact_number {
            active.contact_number = Set(Some(contact_number));
        }
        if let Some(street) = payload.street {
            active.street = Set(street);
        }
        if let Some(city) = payload.city {
            active.city = Set(city);
        }
        if let Some(state) = payload.state {
            active.state = Set(state);
        }
        if let Some(country) = payload.country {
            active.country = Set(country);
        }
        if let Some(zip_code) = payload.zip_code {
            active.zip_code = Set(zip_code);
        }
        if let Some(tree_types) = payload.tree_types {
            active.tree_types = Set(serde_json::json!(tree_types));
        }
        active.version = Set(next_version);
        Ok(active.update(&*self.db).await?)
    }

    /// Refused while the supplier still has shipments in flight.
    #[instrument(skip(self))]
    pub async fn delete_supplier(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.get_supplier(id).await?;

        let in_flight = shipment::Entity::find()
            .filter(shipment::Column::SupplierId.eq(id))
            .all(&*self.db)
            .await?
            .into_iter()
            .filter(|s| s.status.is_in_flight())
            .count();
        if in_flight > 0 {
            return Err(ServiceError::ValidationError(format!(
                "Supplier {} has {} shipments in flight and cannot be deleted",
                id, in_flight
            )));
        }

        supplier::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(supplier_id = id, "supplier deleted");
        Ok(())
    }
}
