use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, QuerySelect, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::inventory_log::InventoryChangeType;
use crate::entities::order::OrderStatus;
use crate::entities::{customer, inventory_item, inventory_log, order, order_item};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct NewSalesRecord {
    pub customer_id: i32,
    pub item_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Defaults to the item's current unit price.
    pub sale_price: Option<Decimal>,
    /// Defaults to now.
    pub placed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSalesRecord {
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub sale_price: Option<Decimal>,
}

/// Flattened order line as the sales endpoints expose it.
#[derive(Debug, Clone, Serialize)]
pub struct SalesRecord {
    pub id: i32,
    pub order_id: i32,
    pub customer_id: i32,
    pub item_id: i32,
    pub product: String,
    pub quantity: i32,
    pub sale_price: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// Sales records are order lines. Creating one books a single-line order and
/// moves stock; all writes for one record share a transaction.
#[derive(Clone)]
pub struct SalesService {
    db: Arc<DbPool>,
}

impl SalesService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn add_sales_record(
        &self,
        actor_id: i32,
        payload: NewSalesRecord,
    ) -> Result<SalesRecord, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let buyer = customer::Entity::find_by_id(payload.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", payload.customer_id))
            })?;

        let item = inventory_item::Entity::find_by_id(payload.item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory item {} not found", payload.item_id))
            })?;

        if item.quantity < payload.quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of '{}' in stock, {} requested",
                item.quantity, item.name, payload.quantity
            )));
        }

        let placed_at = payload.placed_at.unwrap_or_else(Utc::now);
        let sale_price = payload.sale_price.unwrap_or(item.unit_price);

        let booked = order::ActiveModel {
            customer_id: Set(buyer.id),
            status: Set(OrderStatus::Pending),
            placed_at: Set(placed_at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let line = order_item::ActiveModel {
            order_id: Set(booked.id),
            item_id: Set(item.id),
            quantity: Set(payload.quantity),
            sale_price: Set(sale_price),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let product = item.name.clone();
        let remaining = item.quantity - payload.quantity;
        let mut stock: inventory_item::ActiveModel = item.into();
        stock.quantity = Set(remaining);
        stock.update(&txn).await?;

        inventory_log::ActiveModel {
            item_id: Set(line.item_id),
            changed_by: Set(actor_id),
            change_type: Set(InventoryChangeType::Sold),
            amount: Set(-payload.quantity),
            recorded_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(sales_record_id = line.id, order_id = booked.id, "sales record added");

        Ok(SalesRecord {
            id: line.id,
            order_id: booked.id,
            customer_id: buyer.id,
            item_id: line.item_id,
            product,
            quantity: line.quantity,
            sale_price: line.sale_price,
            placed_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<SalesRecord>, ServiceError> {
        let lines = order_item::Entity::find()
            .order_by_asc(order_item::Column::Id)
            .limit(limit)
            .offset(offset)
            .find_also_related(order::Entity)
            .all(&*self.db)
            .await?;

        let item_ids: Vec<i32> = lines.iter().map(|(line, _)| line.item_id).collect();
        let names: std::collections::HashMap<i32, String> = inventory_item::Entity::find()
            .filter(inventory_item::Column::Id.is_in(item_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|item| (item.id, item.name))
            .collect();

        Ok(lines
            .into_iter()
            .filter_map(|(line, parent)| {
                parent.map(|ord| SalesRecord {
                    id: line.id,
                    order_id: ord.id,
                    customer_id: ord.customer_id,
                    item_id: line.item_id,
                    product: names
                        .get(&line.item_id)
                        .cloned()
                        .unwrap_or_else(|| format!("item-{}", line.item_id)),
                    quantity: line.quantity,
                    sale_price: line.sale_price,
                    placed_at: ord.placed_at,
                })
            })
            .collect())
    }

    /// Quantity changes move stock by the delta, in one transaction.
    #[instrument(skip(self, payload))]
    pub async fn update_sales_record(
        &self,
        actor_id: i32,
        id: i32,
        payload: UpdateSalesRecord,
    ) -> Result<order_item::Model, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let line = order_item::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sales record {} not found", id)))?;

        if let Some(new_quantity) = payload.quantity {
            let delta = new_quantity - line.quantity;
            if delta != 0 {
                let item = inventory_item::Entity::find_by_id(line.item_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Inventory item {} not found",
                            line.item_id
                        ))
                    })?;

                if delta > 0 && item.quantity < delta {
                    return Err(ServiceError::InsufficientStock(format!(
                        "Only {} of '{}' in stock, {} more requested",
                        item.quantity, item.name, delta
                    )));
                }

                let remaining = item.quantity - delta;
                let item_id = item.id;
                let mut stock: inventory_item::ActiveModel = item.into();
                stock.quantity = Set(remaining);
                stock.update(&txn).await?;

                inventory_log::ActiveModel {
                    item_id: Set(item_id),
                    changed_by: Set(actor_id),
                    change_type: Set(InventoryChangeType::Adjusted),
                    amount: Set(-delta),
                    recorded_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        let mut active: order_item::ActiveModel = line.into();
        if let Some(quantity) = payload.quantity {
            active.quantity = Set(quantity);
        }
        if let Some(sale_price) = payload.sale_price {
            active.sale_price = Set(sale_price);
        }
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Removing a record restores its stock. An order left with no lines is
    /// removed with it.
    #[instrument(skip(self))]
    pub async fn delete_sales_record(&self, actor_id: i32, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let line = order_item::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Sales record {} not found", id)))?;

        if let Some(item) = inventory_item::Entity::find_by_id(line.item_id).one(&txn).await? {
            let restored = item.quantity + line.quantity;
            let item_id = item.id;
            let mut stock: inventory_item::ActiveModel = item.into();
            stock.quantity = Set(restored);
            stock.update(&txn).await?;

            inventory_log::ActiveModel {
                item_id: Set(item_id),
                changed_by: Set(actor_id),
                change_type: Set(InventoryChangeType::Adjusted),
                amount: Set(line.quantity),
                recorded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        let order_id = line.order_id;
        let quantity = line.quantity;
        order_item::Entity::delete_by_id(line.id).exec(&txn).await?;

        let remaining_lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .count(&txn)
            .await?;
        if remaining_lines == 0 {
            order::Entity::delete_by_id(order_id).exec(&txn).await?;
        }

        txn.commit().await?;
        info!(sales_record_id = id, restored_quantity = quantity, "sales record deleted");
        Ok(())
    }
}
