use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Permission-bearing role carried by every user account. Checks are exact
/// allow-set membership; there is no hierarchy or inheritance.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(40))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "inventory_manager")]
    InventoryManager,
    #[sea_orm(string_value = "sales_manager")]
    SalesManager,
    #[sea_orm(string_value = "analytics_manager")]
    AnalyticsManager,
    #[sea_orm(string_value = "order_fulfillment_officer")]
    OrderFulfillmentOfficer,
    #[sea_orm(string_value = "customer_service_rep")]
    CustomerServiceRep,
    #[sea_orm(string_value = "human_resources_manager")]
    HumanResourcesManager,
    #[sea_orm(string_value = "supply_chain_coordinator")]
    SupplyChainCoordinator,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    #[serde(skip_serializing)]
    pub hashed_password: String,

    pub role: Role,
    pub disabled: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::profile::Entity")]
    Profile,
    #[sea_orm(has_many = "super::schedule::Entity")]
    Schedule,
    #[sea_orm(has_many = "super::payroll::Entity")]
    Payroll,
    #[sea_orm(has_many = "super::inventory_log::Entity")]
    InventoryLog,
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schedule.def()
    }
}

impl Related<super::payroll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payroll.def()
    }
}

impl Related<super::inventory_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
