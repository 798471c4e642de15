use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::inventory_log::InventoryChangeType;
use crate::entities::order::OrderStatus;
use crate::entities::shipment::ShipmentStatus;
use crate::entities::{inventory_item, inventory_log, order, shipment, shipment_item};
use crate::errors::ServiceError;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewShipmentItem {
    pub item_id: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewShipment {
    pub order_id: i32,
    pub supplier_id: Option<i32>,
    pub expected_delivery: DateTime<Utc>,
    #[validate(length(min = 1, max = 200))]
    pub receiver_name: String,
    #[validate(length(min = 1))]
    pub receiver_address: String,
    #[validate(length(min = 1))]
    pub receiver_contact: String,
    #[validate(email)]
    pub receiver_email: Option<String>,
    pub carrier: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<NewShipmentItem>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateShipment {
    /// Caller's view of the row; a mismatch means someone else updated it.
    pub version: i32,
    pub status: Option<ShipmentStatus>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub carrier: Option<String>,
    pub receiver_address: Option<String>,
    pub receiver_contact: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentDetails {
    #[serde(flatten)]
    pub shipment: shipment::Model,
    pub items: Vec<shipment_item::Model>,
}

/// Outbound shipments for customer orders. Creating one packs stock and moves
/// the order to processing, all in one transaction.
#[derive(Clone)]
pub struct ShipmentService {
    db: Arc<DbPool>,
}

impl ShipmentService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, payload))]
    pub async fn create_shipment(
        &self,
        actor_id: i32,
        payload: NewShipment,
    ) -> Result<ShipmentDetails, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let parent = order::Entity::find_by_id(payload.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", payload.order_id))
            })?;

        if parent.status != OrderStatus::Pending {
            return Err(ServiceError::ValidationError(format!(
                "Order {} is {} and cannot be shipped",
                parent.id, parent.status
            )));
        }

        let created = shipment::ActiveModel {
            order_id: Set(parent.id),
            supplier_id: Set(payload.supplier_id),
            status: Set(ShipmentStatus::Preparing),
            expected_delivery: Set(payload.expected_delivery),
            receiver_name: Set(payload.receiver_name),
            receiver_address: Set(payload.receiver_address),
            receiver_contact: Set(payload.receiver_contact),
            receiver_email: Set(payload.receiver_email),
            carrier: Set(payload.carrier),
            version: Set(1),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(payload.items.len());
        for line in &payload.items {
            let stock_row = inventory_item::Entity::find_by_id(line.item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Inventory item {} not found", line.item_id))
                })?;

            if stock_row.quantity < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} of '{}' in stock, {} requested for shipment",
                    stock_row.quantity, stock_row.name, line.quantity
                )));
            }

            let inserted = shipment_item::ActiveModel {
                shipment_id: Set(created.id),
                item_id: Set(stock_row.id),
                quantity: Set(line.quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            let remaining = stock_row.quantity - line.quantity;
            let item_id = stock_row.id;
            let mut stock: inventory_item::ActiveModel = stock_row.into();
            stock.quantity = Set(remaining);
            stock.update(&txn).await?;

            inventory_log::ActiveModel {
                item_id: Set(item_id),
                changed_by: Set(actor_id),
                change_type: Set(InventoryChangeType::Adjusted),
                amount: Set(-line.quantity),
                recorded_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            items.push(inserted);
        }

        let mut parent_active: order::ActiveModel = parent.into();
        parent_active.status = Set(OrderStatus::Processing);
        parent_active.update(&txn).await?;

        txn.commit().await?;
        info!(shipment_id = created.id, order_id = created.order_id, "shipment created");

        Ok(ShipmentDetails {
            shipment: created,
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_shipments(
        &self,
        status: Option<ShipmentStatus>,
    ) -> Result<Vec<shipment::Model>, ServiceError> {
        let mut query = shipment::Entity::find().order_by_desc(shipment::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(shipment::Column::Status.eq(status));
        }
        Ok(query.all(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_shipment(&self, id: i32) -> Result<ShipmentDetails, ServiceError> {
        let found = shipment::Entity::find_by_id(id)
            .find_with_related(shipment_item::Entity)
            .all(&*self.db)
            .await?;

        found
            .into_iter()
            .next()
            .map(|(s, items)| ShipmentDetails { shipment: s, items })
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", id)))
    }

    /// Optimistic update; delivered and cancelled shipments are final. The
    /// shipment write and any order-status propagation share one transaction.
    #[instrument(skip(self, payload))]
    pub async fn update_shipment(
        &self,
        id: i32,
        payload: UpdateShipment,
    ) -> Result<shipment::Model, ServiceError> {
        payload.validate()?;

        let txn = self.db.begin().await?;

        let existing = shipment::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", id)))?;

        if existing.version != payload.version {
            return Err(ServiceError::Conflict(format!(
                "Shipment {} was modified concurrently (version {} expected, {} given)",
                id, existing.version, payload.version
            )));
        }
        if !existing.status.is_in_flight() {
            return Err(ServiceError::ValidationError(format!(
                "Shipment {} is {} and can no longer change",
                id, existing.status
            )));
        }

        let next_version = existing.version + 1;
        let order_id = existing.order_id;
        let new_status = payload.status;

        let mut active: shipment::ActiveModel = existing.into();
        if let Some(status) = payload.status {
            active.status = Set(status);
        }
        if let Some(expected_delivery) = payload.expected_delivery {
            active.expected_delivery = Set(expected_delivery);
        }
        if let Some(carrier) = payload.carrier {
            active.carrier = Set(Some(carrier));
        }
        if let Some(receiver_address) = payload.receiver_address {
            active.receiver_address = Set(receiver_address);
        }
        if let Some(receiver_contact) = payload.receiver_contact {
            active.receiver_contact = Set(receiver_contact);
        }
        active.version = Set(next_version);
        let updated = active.update(&txn).await?;

        // The parent order tracks delivery.
        if new_status == Some(ShipmentStatus::Delivered) {
            if let Some(parent) = order::Entity::find_by_id(order_id).one(&txn).await? {
                let mut parent_active: order::ActiveModel = parent.into();
                parent_active.status = Set(OrderStatus::Delivered);
                parent_active.update(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(updated)
    }
}
