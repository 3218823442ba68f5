use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "leagues")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub sport: String,
    pub created_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::league_members::Entity")]
    LeagueMembers,
    #[sea_orm(has_many = "super::team_seasons::Entity")]
    TeamSeasons,
    #[sea_orm(has_many = "super::owner_aliases::Entity")]
    OwnerAliases,
}

impl Related<super::league_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LeagueMembers.def()
    }
}

impl Related<super::team_seasons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeamSeasons.def()
    }
}

impl Related<super::owner_aliases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OwnerAliases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
