use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

use evergreen_api::auth::AuthService;
use evergreen_api::db::DbPool;
use evergreen_api::entities::order::OrderStatus;
use evergreen_api::entities::shipment::ShipmentStatus;
use evergreen_api::entities::user::Role;
use evergreen_api::errors::ServiceError;
use evergreen_api::migrator::Migrator;
use evergreen_api::services::customers::{CustomerService, NewCustomer};
use evergreen_api::services::inventory::{InventoryService, NewInventoryItem};
use evergreen_api::services::orders::{NewOrder, NewOrderLine, OrderService};
use evergreen_api::services::reports::{NewCustomReport, ReportService};
use evergreen_api::services::roles::{NewStaffRole, StaffRoleService};
use evergreen_api::services::shipments::{
    NewShipment, NewShipmentItem, ShipmentService, UpdateShipment,
};
use evergreen_api::services::staff::{NewScheduleEntry, NewStaffMember, StaffService};
use evergreen_api::services::suppliers::{NewSupplier, SupplierService, UpdateSupplier};
use evergreen_api::services::users::{NewUser, UserService};

const TEST_SECRET: &str = "integration-test-secret-integration-test-secret";

async fn test_pool() -> Arc<DbPool> {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).sqlx_logging(false);
    let pool = Database::connect(opt).await.expect("connect sqlite");
    Migrator::up(&pool, None).await.expect("run migrations");
    Arc::new(pool)
}

fn new_staff(username: &str, email: &str, role: Role) -> NewStaffMember {
    NewStaffMember {
        username: username.to_string(),
        password: "long-enough-password".to_string(),
        role,
        first_name: "Nick".to_string(),
        last_name: "Tannen".to_string(),
        email: email.to_string(),
        phone: None,
        department: Some("lot".to_string()),
    }
}

fn new_supplier(name: &str) -> NewSupplier {
    NewSupplier {
        name: name.to_string(),
        contact_email: Some("sales@nursery.example".to_string()),
        contact_number: None,
        street: "1 Grove Rd".to_string(),
        city: "Bend".to_string(),
        state: "OR".to_string(),
        country: "US".to_string(),
        zip_code: "97701".to_string(),
        tree_types: vec!["fraser_fir".to_string(), "noble_fir".to_string()],
    }
}

#[tokio::test]
async fn staff_lifecycle_creates_and_removes_both_rows() {
    let db = test_pool().await;
    let staff = StaffService::new(db.clone());

    let member = staff
        .create_staff(new_staff("nick", "nick@example.com", Role::CustomerServiceRep))
        .await
        .unwrap();
    assert_eq!(member.profile.user_id, member.user.id);

    staff
        .add_schedule_entry(NewScheduleEntry {
            staff_id: member.user.id,
            event: "lot opening shift".to_string(),
            scheduled_at: Utc::now() + Duration::days(1),
            description: None,
        })
        .await
        .unwrap();

    let details = staff.get_staff(member.user.id).await.unwrap();
    assert_eq!(details.schedules.len(), 1);

    staff.delete_staff(member.user.id).await.unwrap();
    assert!(matches!(
        staff.get_staff(member.user.id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(staff.list_schedule(Some(member.user.id)).await.unwrap().is_empty());
}

#[tokio::test]
async fn accounts_without_profiles_are_not_staff() {
    let db = test_pool().await;
    let users = UserService::new(db.clone(), AuthService::new(TEST_SECRET, 3600));
    let staff = StaffService::new(db.clone());

    users
        .create_user(NewUser {
            username: "api-only".to_string(),
            password: "long-enough-password".to_string(),
            role: Role::Admin,
        })
        .await
        .unwrap();

    assert!(staff.list_staff().await.unwrap().is_empty());
}

#[tokio::test]
async fn role_catalogue_delete_blocked_while_held() {
    let db = test_pool().await;
    let users = UserService::new(db.clone(), AuthService::new(TEST_SECRET, 3600));
    let roles = StaffRoleService::new(db.clone());

    users
        .create_user(NewUser {
            username: "stocker".to_string(),
            password: "long-enough-password".to_string(),
            role: Role::InventoryManager,
        })
        .await
        .unwrap();

    let held = roles
        .create_role(NewStaffRole {
            name: "inventory_manager".to_string(),
            responsibilities: vec!["stock counts".to_string()],
            permissions: vec!["inventory".to_string()],
        })
        .await
        .unwrap();
    let blocked = roles.delete_role(held.id).await;
    assert!(matches!(blocked, Err(ServiceError::ValidationError(_))));

    // A catalogue-only name nobody can hold deletes freely.
    let free = roles
        .create_role(NewStaffRole {
            name: "tree wrangler".to_string(),
            responsibilities: vec![],
            permissions: vec![],
        })
        .await
        .unwrap();
    roles.delete_role(free.id).await.unwrap();
}

#[tokio::test]
async fn supplier_updates_are_optimistic() {
    let db = test_pool().await;
    let suppliers = SupplierService::new(db.clone());

    let created = suppliers.create_supplier(new_supplier("North Nursery")).await.unwrap();
    assert_eq!(created.version, 1);

    let updated = suppliers
        .update_supplier(
            created.id,
            UpdateSupplier {
                version: 1,
                contact_email: None,
                contact_number: Some("555-0100".to_string()),
                street: None,
                city: None,
                state: None,
                country: None,
                zip_code: None,
                tree_types: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    // A writer still holding version 1 loses.
    let stale = suppliers
        .update_supplier(
            created.id,
            UpdateSupplier {
                version: 1,
                contact_email: None,
                contact_number: Some("555-0199".to_string()),
                street: None,
                city: None,
                state: None,
                country: None,
                zip_code: None,
                tree_types: None,
            },
        )
        .await;
    assert!(matches!(stale, Err(ServiceError::Conflict(_))));

    let duplicate = suppliers.create_supplier(new_supplier("North Nursery")).await;
    assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));
}

async fn seed_pending_order(db: &Arc<DbPool>) -> (i32, i32, i32) {
    let staff = StaffService::new(db.clone());
    let actor = staff
        .create_staff(new_staff("packer", "packer@example.com", Role::InventoryManager))
        .await
        .unwrap()
        .user
        .id;

    let customers = CustomerService::new(db.clone());
    let customer = customers
        .create_customer(NewCustomer {
            first_name: "Ada".to_string(),
            last_name: "Winters".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            preferences: None,
        })
        .await
        .unwrap()
        .id;

    let inventory = InventoryService::new(db.clone());
    let item = inventory
        .create_item(
            actor,
            NewInventoryItem {
                name: "Noble Fir".to_string(),
                item_type: "tree".to_string(),
                quantity: 30,
                threshold: 5,
                unit: "each".to_string(),
                unit_price: Decimal::new(6000, 2),
                condition: None,
                location: None,
            },
        )
        .await
        .unwrap()
        .id;

    let orders = OrderService::new(db.clone());
    let details = orders
        .create_order(
            actor,
            NewOrder {
                customer_id: customer,
                lines: vec![NewOrderLine {
                    item_id: item,
                    quantity: 5,
                    sale_price: None,
                }],
                placed_at: None,
            },
        )
        .await
        .unwrap();

    (actor, item, details.order.id)
}

#[tokio::test]
async fn shipment_packs_stock_and_advances_the_order() {
    let db = test_pool().await;
    let (actor, item, order_id) = seed_pending_order(&db).await;

    let shipments = ShipmentService::new(db.clone());
    let details = shipments
        .create_shipment(
            actor,
            NewShipment {
                order_id,
                supplier_id: None,
                expected_delivery: Utc::now() + Duration::days(3),
                receiver_name: "Ada Winters".to_string(),
                receiver_address: "9 Pine St".to_string(),
                receiver_contact: "555-0123".to_string(),
                receiver_email: None,
                carrier: Some("FarmFreight".to_string()),
                items: vec![NewShipmentItem { item_id: item, quantity: 5 }],
            },
        )
        .await
        .unwrap();
    assert_eq!(details.shipment.status, ShipmentStatus::Preparing);

    // 30 seeded, 5 booked by the order, 5 packed for shipping.
    let inventory = InventoryService::new(db.clone());
    assert_eq!(inventory.get_item(item).await.unwrap().quantity, 20);

    let orders = OrderService::new(db.clone());
    let parent = orders.get_order(order_id).await.unwrap();
    assert_eq!(parent.order.status, OrderStatus::Processing);

    // A second shipment for the same order fails: it is no longer pending.
    let again = shipments
        .create_shipment(
            actor,
            NewShipment {
                order_id,
                supplier_id: None,
                expected_delivery: Utc::now() + Duration::days(3),
                receiver_name: "Ada Winters".to_string(),
                receiver_address: "9 Pine St".to_string(),
                receiver_contact: "555-0123".to_string(),
                receiver_email: None,
                carrier: None,
                items: vec![NewShipmentItem { item_id: item, quantity: 1 }],
            },
        )
        .await;
    assert!(matches!(again, Err(ServiceError::ValidationError(_))));

    // Delivery closes both the shipment and the order.
    let delivered = shipments
        .update_shipment(
            details.shipment.id,
            UpdateShipment {
                version: 1,
                status: Some(ShipmentStatus::Delivered),
                expected_delivery: None,
                carrier: None,
                receiver_address: None,
                receiver_contact: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(delivered.status, ShipmentStatus::Delivered);
    assert_eq!(delivered.version, 2);

    let parent = orders.get_order(order_id).await.unwrap();
    assert_eq!(parent.order.status, OrderStatus::Delivered);

    let frozen = shipments
        .update_shipment(
            details.shipment.id,
            UpdateShipment {
                version: 2,
                status: Some(ShipmentStatus::InTransit),
                expected_delivery: None,
                carrier: None,
                receiver_address: None,
                receiver_contact: None,
            },
        )
        .await;
    assert!(matches!(frozen, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn delivery_closes_shipment_and_order_together() {
    let db = test_pool().await;
    let (actor, item, order_id) = seed_pending_order(&db).await;

    let shipments = ShipmentService::new(db.clone());
    let orders = OrderService::new(db.clone());

    let details = shipments
        .create_shipment(
            actor,
            NewShipment {
                order_id,
                supplier_id: None,
                expected_delivery: Utc::now() + Duration::days(2),
                receiver_name: "Ada Winters".to_string(),
                receiver_address: "9 Pine St".to_string(),
                receiver_contact: "555-0123".to_string(),
                receiver_email: None,
                carrier: None,
                items: vec![NewShipmentItem { item_id: item, quantity: 3 }],
            },
        )
        .await
        .unwrap();

    // A non-delivery update never touches the parent order.
    shipments
        .update_shipment(
            details.shipment.id,
            UpdateShipment {
                version: 1,
                status: Some(ShipmentStatus::InTransit),
                expected_delivery: None,
                carrier: Some("FarmFreight".to_string()),
                receiver_address: None,
                receiver_contact: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        orders.get_order(order_id).await.unwrap().order.status,
        OrderStatus::Processing
    );

    shipments
        .update_shipment(
            details.shipment.id,
            UpdateShipment {
                version: 2,
                status: Some(ShipmentStatus::Delivered),
                expected_delivery: None,
                carrier: None,
                receiver_address: None,
                receiver_contact: None,
            },
        )
        .await
        .unwrap();

    // Both rows moved in the same write: shipment delivered, order delivered.
    let shipped = shipments.get_shipment(details.shipment.id).await.unwrap();
    assert_eq!(shipped.shipment.status, ShipmentStatus::Delivered);
    assert_eq!(shipped.shipment.version, 3);
    assert_eq!(
        orders.get_order(order_id).await.unwrap().order.status,
        OrderStatus::Delivered
    );
}

#[tokio::test]
async fn supplier_with_in_flight_shipments_cannot_be_deleted() {
    let db = test_pool().await;
    let (actor, item, order_id) = seed_pending_order(&db).await;

    let suppliers = SupplierService::new(db.clone());
    let supplier = suppliers.create_supplier(new_supplier("Grove & Co")).await.unwrap();

    let shipments = ShipmentService::new(db.clone());
    let details = shipments
        .create_shipment(
            actor,
            NewShipment {
                order_id,
                supplier_id: Some(supplier.id),
                expected_delivery: Utc::now() + Duration::days(7),
                receiver_name: "Ada Winters".to_string(),
                receiver_address: "9 Pine St".to_string(),
                receiver_contact: "555-0123".to_string(),
                receiver_email: None,
                carrier: None,
                items: vec![NewShipmentItem { item_id: item, quantity: 2 }],
            },
        )
        .await
        .unwrap();

    let blocked = suppliers.delete_supplier(supplier.id).await;
    assert!(matches!(blocked, Err(ServiceError::ValidationError(_))));

    shipments
        .update_shipment(
            details.shipment.id,
            UpdateShipment {
                version: 1,
                status: Some(ShipmentStatus::Cancelled),
                expected_delivery: None,
                carrier: None,
                receiver_address: None,
                receiver_contact: None,
            },
        )
        .await
        .unwrap();

    suppliers.delete_supplier(supplier.id).await.unwrap();
}

#[tokio::test]
async fn reports_summarize_revenue_and_stock() {
    let db = test_pool().await;
    let (actor, item, _order_id) = seed_pending_order(&db).await;

    let reports = ReportService::new(db.clone());
    let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let end = Utc::now() + Duration::days(1);

    let financial = reports.financial_report(start, end).await.unwrap();
    assert_eq!(financial.order_count, 1);
    // 5 trees at 60.00 each.
    assert_eq!(financial.total_revenue, Decimal::new(30000, 2));
    assert_eq!(financial.average_order_value, financial.total_revenue);
    assert_eq!(financial.revenue_by_period.len(), 1);

    let operational = reports.operational_report(start, end, true).await.unwrap();
    assert_eq!(operational.inventory_item_count, 1);
    assert!(operational.low_stock_items.is_empty());
    assert_eq!(operational.orders_by_status["pending"], 1);
    assert!(operational.financials.is_some());

    // Draining stock puts the item on the low-stock list.
    let inventory = InventoryService::new(db.clone());
    inventory
        .update_item(
            actor,
            item,
            evergreen_api::services::inventory::UpdateInventoryItem {
                name: None,
                item_type: None,
                quantity: Some(4),
                threshold: None,
                unit: None,
                unit_price: None,
                condition: None,
                location: None,
            },
        )
        .await
        .unwrap();
    let operational = reports.operational_report(start, end, false).await.unwrap();
    assert_eq!(operational.low_stock_items, vec!["Noble Fir".to_string()]);

    let custom = reports
        .create_custom_report(
            actor,
            NewCustomReport {
                start_date: start,
                end_date: end,
                modules: vec!["sales".to_string()],
                metrics: Default::default(),
            },
        )
        .await
        .unwrap();
    assert_eq!(reports.list_custom_reports().await.unwrap().len(), 1);
    reports.delete_custom_report(custom.id).await.unwrap();
    assert!(reports.list_custom_reports().await.unwrap().is_empty());

    let inverted = reports.financial_report(end, start).await;
    assert!(matches!(inverted, Err(ServiceError::ValidationError(_))));
}
