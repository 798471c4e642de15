pub mod analytics;
pub mod customers;
pub mod inventory;
pub mod orders;
pub mod reports;
pub mod roles;
pub mod sales;
pub mod shipments;
pub mod staff;
pub mod suppliers;
pub mod users;
