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

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewOrderLine {
    pub item_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Defaults to the item's current unit price.
    pub sale_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewOrder {
    pub customer_id: i32,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<NewOrderLine>,
    pub placed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrder {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub lines: Vec<order_item::Model>,
}

/// Order lifecycle. Stock moves with the order: booking decrements it line by
/// line, deletion puts it back, each inside one transaction.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_order(
        &self,
        actor_id: i32,
        payload: NewOrder,
    ) -> Result<OrderDetails, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let buyer = customer::Entity::find_by_id(payload.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer {} not found", payload.customer_id))
            })?;

        let booked = order::ActiveModel {
            customer_id: Set(buyer.id),
            status: Set(OrderStatus::Pending),
            placed_at: Set(payload.placed_at.unwrap_or_else(Utc::now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut lines = Vec::with_capacity(payload.lines.len());
        for line in &payload.lines {
            let item = inventory_item::Entity::find_by_id(line.item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Inventory item {} not found", line.item_id))
                })?;

            if item.quantity < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} of '{}' in stock, {} requested",
                    item.quantity, item.name, line.quantity
                )));
            }

            let sale_price = line.sale_price.unwrap_or(item.unit_price);
            let inserted = order_item::ActiveModel {
                order_id: Set(booked.id),
                item_id: Set(item.id),
                quantity: Set(line.quantity),
                sale_price: Set(sale_price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let remaining = item.quantity - line.quantity;
            let item_id = item.id;
            let mut stock: inventory_item::ActiveModel = item.into();
            stock.quantity = Set(remaining);
            stock.update(&txn).await?;

            inventory_log::ActiveModel {
                item_id: Set(item_id),
                changed_by: Set(actor_id),
                change_type: Set(InventoryChangeType::Sold),
                amount: Set(-line.quantity),
                recorded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            lines.push(inserted);
        }

        txn.commit().await?;
        info!(order_id = booked.id, line_count = lines.len(), "order created");

        Ok(OrderDetails {
            order: booked,
            lines,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        limit: u64,
        offset: u64,
        status: Option<OrderStatus>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut query = order::Entity::find().order_by_desc(order::Column::PlacedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }
        Ok(query.limit(limit).offset(offset).all(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: i32) -> Result<OrderDetails, ServiceError> {
        let found = order::Entity::find_by_id(id)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        found
            .into_iter()
            .next()
            .map(|(ord, lines)| OrderDetails { order: ord, lines })
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))
    }

    /// Status transitions only. A cancelled or delivered order is final.
    #[instrument(skip(self, payload))]
    pub async fn update_order(
        &self,
        id: i32,
        payload: UpdateOrder,
    ) -> Result<order::Model, ServiceError> {
        payload.validate()?;
        let details = self.get_order(id).await?;

        if matches!(
            details.order.status,
            OrderStatus::Cancelled | OrderStatus::Delivered
        ) {
            return Err(ServiceError::ValidationError(format!(
                "Order {} is {} and can no longer change",
                id, details.order.status
            )));
        }

        let mut active: order::ActiveModel = details.order.into();
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        Ok(active.update(&*self.db).await?)
    }

    /// Deleting an order restores stock for every line before removing the
    /// order and its lines.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, actor_id: i32, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = order::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

        let lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(id))
            .all(&txn)
            .await?;

        for line in &lines {
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
        }

        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(existing.id).exec(&txn).await?;

        txn.commit().await?;
        info!(order_id = id, "order deleted, stock restored");
        Ok(())
    }
}
