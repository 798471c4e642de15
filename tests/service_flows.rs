use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

use evergreen_api::auth::AuthService;
use evergreen_api::db::DbPool;
use evergreen_api::entities::order::OrderStatus;
use evergreen_api::entities::user::Role;
use evergreen_api::errors::ServiceError;
use evergreen_api::migrator::Migrator;
use evergreen_api::services::customers::{CustomerService, NewCustomer};
use evergreen_api::services::inventory::{InventoryService, NewInventoryItem, UpdateInventoryItem};
use evergreen_api::services::orders::{NewOrder, NewOrderLine, OrderService};
use evergreen_api::services::sales::{NewSalesRecord, SalesService};
use evergreen_api::services::users::{Credentials, NewUser, UserService};

const TEST_SECRET: &str = "integration-test-secret-integration-test-secret";

async fn test_pool() -> Arc<DbPool> {
    // A single connection keeps every query on the same in-memory database.
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).sqlx_logging(false);
    let pool = Database::connect(opt).await.expect("connect sqlite");
    Migrator::up(&pool, None).await.expect("run migrations");
    Arc::new(pool)
}

fn auth_service() -> AuthService {
    AuthService::new(TEST_SECRET, 3600)
}

async fn seed_actor(db: &Arc<DbPool>, role: Role) -> i32 {
    let users = UserService::new(db.clone(), auth_service());
    let account = users
        .create_user(NewUser {
            username: format!("actor-{}", role),
            password: "long-enough-password".to_string(),
            role,
        })
        .await
        .expect("create actor");
    account.id
}

async fn seed_customer(db: &Arc<DbPool>, email: &str) -> i32 {
    let customers = CustomerService::new(db.clone());
    customers
        .create_customer(NewCustomer {
            first_name: "Holly".to_string(),
            last_name: "Greene".to_string(),
            email: email.to_string(),
            phone: None,
            preferences: None,
        })
        .await
        .expect("create customer")
        .id
}

async fn seed_item(db: &Arc<DbPool>, actor: i32, name: &str, quantity: i32) -> i32 {
    let inventory = InventoryService::new(db.clone());
    inventory
        .create_item(
            actor,
            NewInventoryItem {
                name: name.to_string(),
                item_type: "tree".to_string(),
                quantity,
                threshold: 5,
                unit: "each".to_string(),
                unit_price: Decimal::new(4500, 2),
                condition: None,
                location: None,
            },
        )
        .await
        .expect("create item")
        .id
}

#[tokio::test]
async fn authentication_round_trip() {
    let db = test_pool().await;
    let users = UserService::new(db.clone(), auth_service());

    users
        .create_user(NewUser {
            username: "clerk".to_string(),
            password: "winter-wonder-land".to_string(),
            role: Role::SalesManager,
        })
        .await
        .unwrap();

    let token = users
        .authenticate(&Credentials {
            username: "clerk".to_string(),
            password: "winter-wonder-land".to_string(),
        })
        .await
        .unwrap();
    let claims = auth_service().verify_token(&token.access_token).unwrap();
    assert_eq!(claims.username, "clerk");
    assert_eq!(claims.role, Role::SalesManager);

    let wrong = users
        .authenticate(&Credentials {
            username: "clerk".to_string(),
            password: "bad-password-guess".to_string(),
        })
        .await;
    assert!(matches!(wrong, Err(ServiceError::AuthError(_))));

    let unknown = users
        .authenticate(&Credentials {
            username: "nobody".to_string(),
            password: "whatever-it-takes".to_string(),
        })
        .await;
    assert!(matches!(unknown, Err(ServiceError::AuthError(_))));
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let db = test_pool().await;
    let users = UserService::new(db.clone(), auth_service());

    users
        .create_user(NewUser {
            username: "twice".to_string(),
            password: "long-enough-password".to_string(),
            role: Role::Admin,
        })
        .await
        .unwrap();

    let second = users
        .create_user(NewUser {
            username: "twice".to_string(),
            password: "long-enough-password".to_string(),
            role: Role::Admin,
        })
        .await;
    assert!(matches!(second, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn sales_record_moves_stock_and_delete_restores_it() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::SalesManager).await;
    let customer = seed_customer(&db, "buyer@example.com").await;
    let item = seed_item(&db, actor, "Noble Fir", 10).await;

    let sales = SalesService::new(db.clone());
    let inventory = InventoryService::new(db.clone());

    let record = sales
        .add_sales_record(
            actor,
            NewSalesRecord {
                customer_id: customer,
                item_id: item,
                quantity: 4,
                sale_price: None,
                placed_at: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(record.quantity, 4);
    assert_eq!(inventory.get_item(item).await.unwrap().quantity, 6);

    sales.delete_sales_record(actor, record.id).await.unwrap();
    assert_eq!(inventory.get_item(item).await.unwrap().quantity, 10);

    // The single-line order went with its record.
    let orders = OrderService::new(db.clone());
    assert!(matches!(
        orders.get_order(record.order_id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn oversold_sales_record_fails_without_partial_state() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::SalesManager).await;
    let customer = seed_customer(&db, "buyer@example.com").await;
    let item = seed_item(&db, actor, "Blue Spruce", 3).await;

    let sales = SalesService::new(db.clone());
    let result = sales
        .add_sales_record(
            actor,
            NewSalesRecord {
                customer_id: customer,
                item_id: item,
                quantity: 5,
                sale_price: None,
                placed_at: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));

    // Nothing committed: stock unchanged, no orders booked.
    let inventory = InventoryService::new(db.clone());
    assert_eq!(inventory.get_item(item).await.unwrap().quantity, 3);
    let orders = OrderService::new(db.clone());
    assert!(orders.list_orders(10, 0, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn order_lifecycle_restores_stock_on_delete() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::OrderFulfillmentOfficer).await;
    let customer = seed_customer(&db, "orders@example.com").await;
    let firs = seed_item(&db, actor, "Fraser Fir", 20).await;
    let wreaths = seed_item(&db, actor, "Wreath", 8).await;

    let orders = OrderService::new(db.clone());
    let inventory = InventoryService::new(db.clone());

    let details = orders
        .create_order(
            actor,
            NewOrder {
                customer_id: customer,
                lines: vec![
                    NewOrderLine {
                        item_id: firs,
                        quantity: 5,
                        sale_price: None,
                    },
                    NewOrderLine {
                        item_id: wreaths,
                        quantity: 2,
                        sale_price: Some(Decimal::new(2500, 2)),
                    },
                ],
                placed_at: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.lines.len(), 2);
    assert_eq!(inventory.get_item(firs).await.unwrap().quantity, 15);
    assert_eq!(inventory.get_item(wreaths).await.unwrap().quantity, 6);

    orders.delete_order(actor, details.order.id).await.unwrap();
    assert_eq!(inventory.get_item(firs).await.unwrap().quantity, 20);
    assert_eq!(inventory.get_item(wreaths).await.unwrap().quantity, 8);
}

#[tokio::test]
async fn order_with_oversold_line_books_nothing() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::OrderFulfillmentOfficer).await;
    let customer = seed_customer(&db, "orders@example.com").await;
    let firs = seed_item(&db, actor, "Fraser Fir", 20).await;
    let stands = seed_item(&db, actor, "Tree Stand", 1).await;

    let orders = OrderService::new(db.clone());
    let result = orders
        .create_order(
            actor,
            NewOrder {
                customer_id: customer,
                lines: vec![
                    NewOrderLine {
                        item_id: firs,
                        quantity: 5,
                        sale_price: None,
                    },
                    NewOrderLine {
                        item_id: stands,
                        quantity: 3,
                        sale_price: None,
                    },
                ],
                placed_at: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::InsufficientStock(_))));

    // The first line's decrement rolled back with the rest.
    let inventory = InventoryService::new(db.clone());
    assert_eq!(inventory.get_item(firs).await.unwrap().quantity, 20);
    assert!(orders.list_orders(10, 0, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn finalized_orders_reject_updates() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::OrderFulfillmentOfficer).await;
    let customer = seed_customer(&db, "orders@example.com").await;
    let item = seed_item(&db, actor, "Fraser Fir", 20).await;

    let orders = OrderService::new(db.clone());
    let details = orders
        .create_order(
            actor,
            NewOrder {
                customer_id: customer,
                lines: vec![NewOrderLine {
                    item_id: item,
                    quantity: 1,
                    sale_price: None,
                }],
                placed_at: None,
            },
        )
        .await
        .unwrap();

    orders
        .update_order(
            details.order.id,
            evergreen_api::services::orders::UpdateOrder {
                status: Some(OrderStatus::Cancelled),
            },
        )
        .await
        .unwrap();

    let again = orders
        .update_order(
            details.order.id,
            evergreen_api::services::orders::UpdateOrder {
                status: Some(OrderStatus::Processing),
            },
        )
        .await;
    assert!(matches!(again, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn inventory_quantity_change_leaves_an_audit_delta() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::InventoryManager).await;
    let item = seed_item(&db, actor, "Garland", 12).await;

    let inventory = InventoryService::new(db.clone());
    let updated = inventory
        .update_item(
            actor,
            item,
            UpdateInventoryItem {
                name: None,
                item_type: None,
                quantity: Some(20),
                threshold: None,
                unit: None,
                unit_price: None,
                condition: None,
                location: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.quantity, 20);

    // The actor now has log entries, so the account cannot be removed.
    let users = UserService::new(db.clone(), auth_service());
    let blocked = users.delete_user(actor).await;
    assert!(matches!(blocked, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn customer_with_orders_cannot_be_deleted() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::SalesManager).await;
    let customer = seed_customer(&db, "regular@example.com").await;
    let item = seed_item(&db, actor, "Noble Fir", 10).await;

    let sales = SalesService::new(db.clone());
    sales
        .add_sales_record(
            actor,
            NewSalesRecord {
                customer_id: customer,
                item_id: item,
                quantity: 1,
                sale_price: None,
                placed_at: None,
            },
        )
        .await
        .unwrap();

    let customers = CustomerService::new(db.clone());
    let blocked = customers.delete_customer(customer).await;
    assert!(matches!(blocked, Err(ServiceError::ValidationError(_))));

    let history = customers.customer_orders(customer).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn sales_trends_over_stored_orders() {
    let db = test_pool().await;
    let actor = seed_actor(&db, Role::SalesManager).await;
    let customer_a = seed_customer(&db, "a@example.com").await;
    let customer_b = seed_customer(&db, "b@example.com").await;
    let firs = seed_item(&db, actor, "Fraser Fir", 100).await;
    let wreaths = seed_item(&db, actor, "Wreath", 100).await;

    let sales = SalesService::new(db.clone());
    let january = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
    let february = Utc.with_ymd_and_hms(2024, 2, 8, 9, 0, 0).unwrap();

    for (customer, item, quantity, placed) in [
        (customer_a, firs, 3, january),
        (customer_b, wreaths, 1, january),
        (customer_a, firs, 2, february),
    ] {
        sales
            .add_sales_record(
                actor,
                NewSalesRecord {
                    customer_id: customer,
                    item_id: item,
                    quantity,
                    sale_price: None,
                    placed_at: Some(placed),
                },
            )
            .await
            .unwrap();
    }

    let analytics = evergreen_api::services::analytics::AnalyticsService::new(db.clone());
    let report = analytics
        .sales_trends(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
            None,
            Some("retail"),
        )
        .await
        .unwrap();

    assert_eq!(report.peak_periods, vec!["2024-01"]);
    assert_eq!(report.top_products[0].product, "Fraser Fir");
    assert_eq!(report.top_products[0].quantity, 5);
    assert_eq!(report.customer_trends[&customer_a].order_count, 2);
    assert_eq!(report.customer_trends[&customer_a].segments, vec!["retail"]);

    let inverted = analytics
        .sales_trends(
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            None,
            None,
        )
        .await;
    assert!(matches!(inverted, Err(ServiceError::ValidationError(_))));
}
