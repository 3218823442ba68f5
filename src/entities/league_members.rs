use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "league_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub league_id: i32,
    pub user_id: i64,
    pub role: String,
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
