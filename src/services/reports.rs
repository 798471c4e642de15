use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{custom_report, inventory_item, order, order_item, schedule};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_revenue: Decimal,
    pub order_count: u64,
    pub average_order_value: Decimal,
    /// Revenue per `YYYY-MM` bucket.
    pub revenue_by_period: HashMap<String, Decimal>,
    /// Synchronization with the external ledger system is out of scope;
    /// surfaced as a status string only.
    pub ledger_sync: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationalReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub inventory_item_count: u64,
    pub low_stock_items: Vec<String>,
    pub out_of_stock_items: Vec<String>,
    pub orders_by_status: HashMap<String, u64>,
    pub scheduled_events: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub financials: Option<FinancialReport>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCustomReport {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub modules: Vec<String>,
    pub metrics: HashMap<String, Vec<String>>,
}

/// Financial and operational rollups plus the stored custom-report catalogue.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn financial_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FinancialReport, ServiceError> {
        validate_range(start, end)?;

        let orders_with_items = order::Entity::find()
            .filter(order::Column::PlacedAt.gte(start))
            .filter(order::Column::PlacedAt.lte(end))
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        let order_count = orders_with_items.len() as u64;
        let mut total_revenue = Decimal::ZERO;
        let mut revenue_by_period: HashMap<String, Decimal> = HashMap::new();

        for (ord, lines) in &orders_with_items {
            let order_total: Decimal = lines
                .iter()
                .map(|line| line.sale_price * Decimal::from(line.quantity))
                .sum();
            total_revenue += order_total;
            let period = ord.placed_at.format("%Y-%m").to_string();
            *revenue_by_period.entry(period).or_insert(Decimal::ZERO) += order_total;
        }

        let average_order_value = if order_count > 0 {
            total_revenue / Decimal::from(order_count)
        } else {
            Decimal::ZERO
        };

        Ok(FinancialReport {
            start,
            end,
            total_revenue,
            order_count,
            average_order_value,
            revenue_by_period,
            ledger_sync: "not_synchronized",
        })
    }

    #[instrument(skip(self))]
    pub async fn operational_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_financials: bool,
    ) -> Result<OperationalReport, ServiceError> {
        validate_range(start, end)?;

        let items = inventory_item::Entity::find().all(&*self.db).await?;
        let inventory_item_count = items.len() as u64;
        let out_of_stock_items: Vec<String> = items
            .iter()
            .filter(|i| i.quantity == 0)
            .map(|i| i.name.clone())
            .collect();
        let low_stock_items: Vec<String> = items
            .iter()
            .filter(|i| i.quantity > 0 && i.quantity <= i.threshold)
            .map(|i| i.name.clone())
            .collect();

        let orders = order::Entity::find()
            .filter(order::Column::PlacedAt.gte(start))
            .filter(order::Column::PlacedAt.lte(end))
            .all(&*self.db)
            .await?;
        let mut orders_by_status: HashMap<String, u64> = HashMap::new();
        for ord in &orders {
            *orders_by_status.entry(ord.status.to_string()).or_insert(0) += 1;
        }

        let scheduled_events = schedule::Entity::find()
            .filter(schedule::Column::ScheduledAt.gte(start))
            .filter(schedule::Column::ScheduledAt.lte(end))
            .count(&*self.db)
            .await?;

        let financials = if include_financials {
            Some(self.financial_report(start, end).await?)
        } else {
            None
        };

        Ok(OperationalReport {
            start,
            end,
            inventory_item_count,
            low_stock_items,
            out_of_stock_items,
            orders_by_status,
            scheduled_events,
            financials,
        })
    }

    #[instrument(skip(self, payload))]
    pub async fn create_custom_report(
        &self,
        actor_id: i32,
        payload: NewCustomReport,
    ) -> Result<custom_report::Model, ServiceError> {
        payload.validate()?;
        validate_range(payload.start_date, payload.end_date)?;

        let generated_query = build_report_query(&payload);

        let created = custom_report::ActiveModel {
            start_date: Set(payload.start_date),
            end_date: Set(payload.end_date),
            modules: Set(serde_json::json!(payload.modules)),
            metrics: Set(serde_json::json!(payload.metrics)),
            generated_query: Set(generated_query),
            created_by: Set(actor_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(report_id = created.id, "custom report created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn list_custom_reports(&self) -> Result<Vec<custom_report::Model>, ServiceError> {
        Ok(custom_report::Entity::find()
            .order_by_desc(custom_report::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_custom_report(&self, id: i32) -> Result<(), ServiceError> {
        let existing = custom_report::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Custom report {} not found", id)))?;

        custom_report::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;
        info!(report_id = id, "custom report deleted");
        Ok(())
    }
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ServiceError> {
    if end < start {
        return Err(ServiceError::ValidationError(
            "End date must not precede start date".to_string(),
        ));
    }
    Ok(())
}

/// Human-readable description of what the stored report covers.
fn build_report_query(payload: &NewCustomReport) -> String {
    let mut parts: Vec<String> = Vec::new();
    for module in &payload.modules {
        let metrics = payload
            .metrics
            .get(module)
            .map(|m| m.join(", "))
            .unwrap_or_else(|| "all".to_string());
        parts.push(format!("{}: {}", module, metrics));
    }
    format!(
        "SELECT [{}] FROM {} TO {}",
        parts.join("; "),
        payload.start_date.format("%Y-%m-%d"),
        payload.end_date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn range_validation_rejects_inverted_ranges() {
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(validate_range(start, end).is_err());
        assert!(validate_range(end, start).is_ok());
        assert!(validate_range(start, start).is_ok());
    }

    #[test]
    fn generated_query_names_modules_and_metrics() {
        let mut metrics = HashMap::new();
        metrics.insert("sales".to_string(), vec!["revenue".to_string()]);
        let payload = NewCustomReport {
            start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
            modules: vec!["sales".to_string(), "inventory".to_string()],
            metrics,
        };
        let query = build_report_query(&payload);
        assert!(query.contains("sales: revenue"));
        assert!(query.contains("inventory: all"));
        assert!(query.contains("2024-01-01"));
    }
}
