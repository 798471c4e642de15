use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::QueryOrder;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::DbPool;
use crate::entities::{inventory_item, order, order_item};
use crate::errors::ServiceError;

/// One order flattened for aggregation: when it was placed, who placed it,
/// and the (product name, quantity) lines it carried.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub customer_id: i32,
    pub placed_at: DateTime<Utc>,
    pub line_items: Vec<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTotal {
    pub product: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerTrend {
    pub order_count: i64,
    /// Distinct segment labels observed for this customer. Currently this is
    /// the caller-supplied filter value stored verbatim, not an attribute
    /// derived from the customer record; kept as-is pending product-owner
    /// clarification.
    pub segments: Vec<String>,
}

/// Result of [`aggregate_sales_trends`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTrendReport {
    /// Every period label whose order count ties the maximum. First-seen
    /// order, never just one winner.
    pub peak_periods: Vec<String>,
    /// At most five products, descending by total quantity sold. Ties keep
    /// first-encountered order.
    pub top_products: Vec<ProductTotal>,
    pub customer_trends: HashMap<i32, CustomerTrend>,
}

/// Group orders into year-month buckets, tally product quantities, and track
/// per-customer order counts. Pure in-memory aggregation; range filtering and
/// permission checks happen upstream.
pub fn aggregate_sales_trends(orders: &[OrderRecord], segment: Option<&str>) -> SalesTrendReport {
    let mut period_order: Vec<String> = Vec::new();
    let mut period_counts: HashMap<String, i64> = HashMap::new();

    let mut product_order: Vec<String> = Vec::new();
    let mut product_totals: HashMap<String, i64> = HashMap::new();

    let mut customer_trends: HashMap<i32, CustomerTrend> = HashMap::new();

    for record in orders {
        let period = record.placed_at.format("%Y-%m").to_string();
        if !period_counts.contains_key(&period) {
            period_order.push(period.clone());
        }
        *period_counts.entry(period).or_insert(0) += 1;

        for (product, quantity) in &record.line_items {
            if !product_totals.contains_key(product) {
                product_order.push(product.clone());
            }
            *product_totals.entry(product.clone()).or_insert(0) += quantity;
        }

        let trend = customer_trends
            .entry(record.customer_id)
            .or_insert_with(|| CustomerTrend {
                order_count: 0,
                segments: Vec::new(),
            });
        trend.order_count += 1;
        if let Some(label) = segment {
            if !trend.segments.iter().any(|s| s == label) {
                trend.segments.push(label.to_string());
            }
        }
    }

    let max_count = period_counts.values().copied().max().unwrap_or(0);
    let peak_periods = period_order
        .into_iter()
        .filter(|p| period_counts[p] == max_count)
        .collect();

    // Stable sort keeps first-encountered order among equal totals.
    let mut ranked: Vec<ProductTotal> = product_order
        .into_iter()
        .map(|product| {
            let quantity = product_totals[&product];
            ProductTotal { product, quantity }
        })
        .collect();
    ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity));
    ranked.truncate(5);

    SalesTrendReport {
        peak_periods,
        top_products: ranked,
        customer_trends,
    }
}

/// Loads orders in range and runs the trend aggregation over them.
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<DbPool>,
}

impl AnalyticsService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn sales_trends(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        product: Option<&str>,
        segment: Option<&str>,
    ) -> Result<SalesTrendReport, ServiceError> {
        if end < start {
            return Err(ServiceError::ValidationError(
                "End date must not precede start date".to_string(),
            ));
        }

        let orders_with_items = order::Entity::find()
            .filter(order::Column::PlacedAt.gte(start))
            .filter(order::Column::PlacedAt.lte(end))
            .order_by_asc(order::Column::PlacedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        let item_ids: Vec<i32> = orders_with_items
            .iter()
            .flat_map(|(_, lines)| lines.iter().map(|l| l.item_id))
            .collect();

        let names: HashMap<i32, String> = inventory_item::Entity::find()
            .filter(inventory_item::Column::Id.is_in(item_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|item| (item.id, item.name))
            .collect();

        let mut records: Vec<OrderRecord> = orders_with_items
            .into_iter()
            .map(|(ord, lines)| OrderRecord {
                customer_id: ord.customer_id,
                placed_at: ord.placed_at,
                line_items: lines
                    .into_iter()
                    .map(|line| {
                        let name = names
                            .get(&line.item_id)
                            .cloned()
                            .unwrap_or_else(|| format!("item-{}", line.item_id));
                        (name, i64::from(line.quantity))
                    })
                    .collect(),
            })
            .collect();

        // Product filter keeps whole orders that contain the product, not
        // just the matching lines.
        if let Some(name) = product {
            records.retain(|r| r.line_items.iter().any(|(p, _)| p == name));
        }

        Ok(aggregate_sales_trends(&records, segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn rec(customer_id: i32, placed: DateTime<Utc>, lines: &[(&str, i64)]) -> OrderRecord {
        OrderRecord {
            customer_id,
            placed_at: placed,
            line_items: lines
                .iter()
                .map(|(name, qty)| (ToString::to_string(&name), *qty))
                .collect(),
        }
    }

    #[test]
    fn empty_order_set_yields_empty_report() {
        let report = aggregate_sales_trends(&[], None);
        assert!(report.peak_periods.is_empty());
        assert!(report.top_products.is_empty());
        assert!(report.customer_trends.is_empty());
    }

    #[test]
    fn single_peak_and_product_totals() {
        let orders = vec![
            rec(1, ts(2024, 1, 5), &[("ProductA", 3)]),
            rec(2, ts(2024, 1, 9), &[("ProductB", 1)]),
            rec(1, ts(2024, 2, 3), &[("ProductA", 2)]),
        ];
        let report = aggregate_sales_trends(&orders, None);

        assert_eq!(report.peak_periods, vec!["2024-01"]);
        assert_eq!(
            report.top_products,
            vec![
                ProductTotal {
                    product: "ProductA".to_string(),
                    quantity: 5
                },
                ProductTotal {
                    product: "ProductB".to_string(),
                    quantity: 1
                },
            ]
        );
        assert_eq!(report.customer_trends[&1].order_count, 2);
        assert_eq!(report.customer_trends[&2].order_count, 1);
    }

    #[test]
    fn tied_periods_all_appear_in_first_seen_order() {
        let orders = vec![
            rec(1, ts(2024, 3, 1), &[]),
            rec(1, ts(2024, 4, 1), &[]),
            rec(1, ts(2024, 3, 15), &[]),
            rec(1, ts(2024, 4, 20), &[]),
        ];
        let report = aggregate_sales_trends(&orders, None);
        assert_eq!(report.peak_periods, vec!["2024-03", "2024-04"]);
    }

    #[test]
    fn peak_counts_equal_the_maximum() {
        let orders = vec![
            rec(1, ts(2024, 1, 1), &[]),
            rec(1, ts(2024, 1, 2), &[]),
            rec(1, ts(2024, 2, 1), &[]),
        ];
        let report = aggregate_sales_trends(&orders, None);
        assert!(!report.peak_periods.is_empty());
        assert_eq!(report.peak_periods, vec!["2024-01"]);
    }

    #[test]
    fn top_products_capped_at_five_and_sorted_descending() {
        let orders = vec![rec(
            1,
            ts(2024, 6, 1),
            &[
                ("A", 1),
                ("B", 9),
                ("C", 4),
                ("D", 7),
                ("E", 2),
                ("F", 8),
                ("G", 3),
            ],
        )];
        let report = aggregate_sales_trends(&orders, None);

        assert_eq!(report.top_products.len(), 5);
        for pair in report.top_products.windows(2) {
            assert!(pair[0].quantity >= pair[1].quantity);
        }
        assert_eq!(report.top_products[0].product, "B");
        assert!(!report.top_products.iter().any(|p| p.product == "A"));
    }

    #[test]
    fn tied_products_keep_first_encountered_order() {
        let orders = vec![
            rec(1, ts(2024, 6, 1), &[("Late", 2)]),
            rec(1, ts(2024, 6, 2), &[("Early", 2)]),
        ];
        let report = aggregate_sales_trends(&orders, None);
        assert_eq!(report.top_products[0].product, "Late");
        assert_eq!(report.top_products[1].product, "Early");
    }

    #[test]
    fn unsold_products_are_absent_not_zero_padded() {
        let orders = vec![rec(1, ts(2024, 1, 1), &[("Sold", 1)])];
        let report = aggregate_sales_trends(&orders, None);
        assert_eq!(report.top_products.len(), 1);
    }

    #[test]
    fn segment_label_is_stored_verbatim_per_customer() {
        let orders = vec![
            rec(1, ts(2024, 1, 1), &[]),
            rec(1, ts(2024, 2, 1), &[]),
            rec(2, ts(2024, 1, 5), &[]),
        ];
        let report = aggregate_sales_trends(&orders, Some("wholesale"));

        assert_eq!(report.customer_trends[&1].segments, vec!["wholesale"]);
        assert_eq!(report.customer_trends[&2].segments, vec!["wholesale"]);
        assert_eq!(report.customer_trends[&1].order_count, 2);
    }

    #[test]
    fn no_segment_filter_leaves_segments_empty() {
        let orders = vec![rec(1, ts(2024, 1, 1), &[])];
        let report = aggregate_sales_trends(&orders, None);
        assert!(report.customer_trends[&1].segments.is_empty());
    }

    #[test]
    fn reported_totals_never_exceed_true_totals() {
        let orders = vec![
            rec(1, ts(2024, 1, 1), &[("A", 3), ("B", 2)]),
            rec(2, ts(2024, 1, 2), &[("A", 4)]),
        ];
        let report = aggregate_sales_trends(&orders, None);

        let mut true_totals: HashMap<&str, i64> = HashMap::new();
        for order in &orders {
            for (name, qty) in &order.line_items {
                *true_totals.entry(name.as_str()).or_insert(0) += qty;
            }
        }
        for entry in &report.top_products {
            assert!(entry.quantity <= true_totals[entry.product.as_str()]);
        }
    }
}
