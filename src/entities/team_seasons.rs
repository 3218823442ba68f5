use sea_orm::entity::prelude::*;

/// One team's season inside a league. Uniqueness is the composite
/// (league_id, season_year, owner_name) index added by the initial migration.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "team_seasons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub league_id: i32,
    pub season_year: i32,
    pub owner_name: String,
    pub team_name: String,
    pub owner_user_id: Option<i64>,
    pub final_standing: Option<i32>,
    pub wins: i32,
    pub losses: i32,
    pub ties: i32,
    pub points_for: f64,
    pub points_against: f64,
    pub playoff_result: Option<String>,
    pub draft_data: Option<String>,
    pub roster_data: Option<String>,
    pub weekly_scores: Option<String>,
    pub transactions: Option<String>,
    /// Provider settings blob, stored verbatim.
    pub settings: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::leagues::Entity",
        from = "Column::LeagueId",
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
