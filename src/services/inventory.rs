use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set, TransactionTrait};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::inventory_log::InventoryChangeType;
use crate::entities::{inventory_item, inventory_log, order_item};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewInventoryItem {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub item_type: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub threshold: i32,
    #[validate(length(min = 1, max = 32))]
    pub unit: String,
    pub unit_price: Decimal,
    pub condition: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInventoryItem {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub item_type: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub threshold: Option<i32>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub condition: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryFilter {
    pub item_type: Option<String>,
    /// When true, only items at or below their threshold.
    pub low_stock: Option<bool>,
}

/// Stock CRUD. Every quantity change writes an audit log row in the same
/// transaction as the stock write.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_item(
        &self,
        actor_id: i32,
        payload: NewInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let item = inventory_item::ActiveModel {
            name: Set(payload.name),
            item_type: Set(payload.item_type),
            quantity: Set(payload.quantity),
            threshold: Set(payload.threshold),
            unit: Set(payload.unit),
            unit_price: Set(payload.unit_price),
            condition: Set(payload.condition),
            location: Set(payload.location),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if item.quantity > 0 {
            inventory_log::ActiveModel {
                item_id: Set(item.id),
                changed_by: Set(actor_id),
                change_type: Set(InventoryChangeType::Received),
                amount: Set(item.quantity),
                recorded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        info!(item_id = item.id, "inventory item created");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        filter: InventoryFilter,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let mut query = inventory_item::Entity::find().order_by_asc(inventory_item::Column::Id);
        if let Some(item_type) = filter.item_type {
            query = query.filter(inventory_item::Column::ItemType.eq(item_type));
        }
        let mut items = query.all(&*self.db).await?;
        if filter.low_stock.unwrap_or(false) {
            items.retain(|i| i.quantity <= i.threshold);
        }
        Ok(items)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, id: i32) -> Result<inventory_item::Model, ServiceError> {
        inventory_item::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", id)))
    }

    /// Update item attributes. A quantity change is applied as an `adjusted`
    /// delta with its log row in the same transaction.
    #[instrument(skip(self, payload))]
    pub async fn update_item(
        &self,
        actor_id: i32,
        id: i32,
        payload: UpdateInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        payload.validate()?;
        let existing = self.get_item(id).await?;
        let previous_quantity = existing.quantity;

        let txn = self.db.begin().await?;

        let mut active: inventory_item::ActiveModel = existing.into();
        if let Some(name) = payload.name {
            active.name = Set(name);
        }
        if let Some(item_type) = payload.item_type {
            active.item_type = Set(item_type);
        }
        if let Some(quantity) = payload.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(threshold) = payload.threshold {
            active.threshold = Set(threshold);
        }
        if let Some(unit) = payload.unit {
            active.unit = Set(unit);
        }
        if let Some(unit_price) = payload.unit_price {
            active.unit_price = Set(unit_price);
        }
        if let Some(condition) = payload.condition {
            active.condition = Set(Some(condition));
        }
        if let Some(location) = payload.location {
            active.location = Set(Some(location));
        }
        let updated = active.update(&txn).await?;

        let delta = updated.quantity - previous_quantity;
        if delta != 0 {
            inventory_log::ActiveModel {
                item_id: Set(updated.id),
                changed_by: Set(actor_id),
                change_type: Set(InventoryChangeType::Adjusted),
                amount: Set(delta),
                recorded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Refused while order lines still reference the item.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.get_item(id).await?;

        let line_refs = order_item::Entity::find()
            .filter(order_item::Column::ItemId.eq(id))
            .count(&*self.db)
            .await?;
        if line_refs > 0 {
            return Err(ServiceError::ValidationError(format!(
                "Inventory item {} appears in {} order lines and cannot be deleted",
                id, line_refs
            )));
        }

        inventory_item::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(item_id = id, "inventory item deleted");
        Ok(())
    }
}
