pub mod common;
pub mod customers;
pub mod inventory;
pub mod orders;
pub mod reports;
pub mod sales;
pub mod staff;
pub mod supply_chain;
pub mod users;
