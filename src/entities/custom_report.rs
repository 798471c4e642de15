use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Saved definition of an ad-hoc report run.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "custom_reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub start_date: DateTimeUtc,
    pub end_date: DateTimeUtc,

    /// Modules the report covered, as a JSON string array.
    pub modules: Json,

    /// Metrics requested per module, as a JSON map.
    pub metrics: Json,

    pub generated_query: String,
    pub created_by: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
