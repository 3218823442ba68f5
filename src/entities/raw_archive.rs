use sea_orm::entity::prelude::*;

/// Append-only raw provider payloads; duplicates across imports are expected.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "raw_archive")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub provider: String,
    pub data_type: String,
    pub event_ref: String,
    pub payload: String,
    pub record_count: i32,
    pub ingested_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
