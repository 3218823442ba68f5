use crate::entities::{league_members, leagues, owner_aliases, prelude::*};
use anyhow::Result;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

pub struct LeagueRepository {
    conn: DatabaseConnection,
}

impl LeagueRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, name: &str, sport: &str) -> Result<i32> {
        let model = leagues::ActiveModel {
            name: Set(name.to_string()),
            sport: Set(sport.to_string()),
            created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
            ..Default::default()
        };
        let result = Leagues::insert(model).exec(&self.conn).await?;
        Ok(result.last_insert_id)
    }

    pub async fn get(&self, id: i32) -> Result<Option<leagues::Model>> {
        Ok(Leagues::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn find_by_name_ci(&self, name: &str) -> Result<Option<leagues::Model>> {
        let found = Leagues::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(leagues::Column::Name)))
                    .eq(name.to_lowercase()),
            )
            .one(&self.conn)
            .await?;
        Ok(found)
    }

    pub async fn list_all(&self) -> Result<Vec<leagues::Model>> {
        Ok(Leagues::find()
            .order_by_asc(leagues::Column::Name)
            .all(&self.conn)
            .await?)
    }

    pub async fn ensure_member(&self, league_id: i32, user_id: i64, role: &str) -> Result<()> {
        let existing = LeagueMembers::find()
            .filter(league_members::Column::LeagueId.eq(league_id))
            .filter(league_members::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await?;
        if existing > 0 {
            return Ok(());
        }
        let model = league_members::ActiveModel {
            league_id: Set(league_id),
            user_id: Set(user_id),
            role: Set(role.to_string()),
            created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
            ..Default::default()
        };
        LeagueMembers::insert(model)
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    /// Replaces the whole alias set for one owner in one transaction.
    pub async fn replace_aliases(
        &self,
        league_id: i32,
        owner_user_id: i64,
        aliases: &[String],
    ) -> Result<()> {
        let txn = self.conn.begin().await?;

        OwnerAliases::delete_many()
            .filter(owner_aliases::Column::LeagueId.eq(league_id))
            .filter(owner_aliases::Column::OwnerUserId.eq(owner_user_id))
            .exec(&txn)
            .await?;

        if !aliases.is_empty() {
            let now = chrono::Utc::now().to_rfc3339();
            let rows = aliases.iter().map(|alias| owner_aliases::ActiveModel {
                league_id: Set(league_id),
                owner_user_id: Set(owner_user_id),
                alias: Set(alias.clone()),
                created_at: Set(Some(now.clone())),
                ..Default::default()
            });
            OwnerAliases::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn aliases_for(&self, league_id: i32, owner_user_id: i64) -> Result<Vec<String>> {
        let rows = OwnerAliases::find()
            .filter(owner_aliases::Column::LeagueId.eq(league_id))
            .filter(owner_aliases::Column::OwnerUserId.eq(owner_user_id))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|r| r.alias).collect())
    }
}
