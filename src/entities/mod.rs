//! Database entities. All durable state lives here; the services only issue
//! reads and writes against these models.

pub mod custom_report;
pub mod customer;
pub mod inventory_item;
pub mod inventory_log;
pub mod order;
pub mod order_item;
pub mod payroll;
pub mod profile;
pub mod schedule;
pub mod shipment;
pub mod shipment_item;
pub mod staff_role;
pub mod supplier;
pub mod user;

pub use user::Role;
