use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "import_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_user_id: i64,
    pub provider: String,
    pub league_ref: String,
    pub status: String,
    pub seasons_found: i32,
    /// JSON array of imported season years.
    pub seasons_imported: Option<String>,
    pub progress_pct: i32,
    /// JSON array of {message, timestamp} objects.
    pub error_log: Option<String>,
    pub canonical_league_id: Option<i32>,
    /// JSON array of self-healed season years.
    pub repaired_seasons: Option<String>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::leagues::Entity",
        from = "Column::CanonicalLeagueId",
        to = "super::leagues::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Leagues,
}

impl Related<super::leagues::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Leagues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
