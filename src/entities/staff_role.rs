use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Descriptive role catalog managed by HR. Distinct from the account-level
/// [`super::user::Role`] that drives permission checks.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "staff_roles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub name: String,

    /// JSON string array of duties.
    pub responsibilities: Json,

    /// JSON string array of granted capabilities.
    pub permissions: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
