use crate::entities::{prelude::*, team_seasons};
use crate::normalize::CanonicalRecord;
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

pub struct TeamSeasonRepository {
    conn: DatabaseConnection,
}

fn to_active(league_id: i32, record: &CanonicalRecord) -> team_seasons::ActiveModel {
    team_seasons::ActiveModel {
        league_id: Set(league_id),
        season_year: Set(record.season_year),
        owner_name: Set(record.owner_name.clone()),
        team_name: Set(record.team_name.clone()),
        owner_user_id: Set(record.owner_user_id),
        final_standing: Set(record.final_standing),
        wins: Set(record.wins),
        losses: Set(record.losses),
        ties: Set(record.ties),
        points_for: Set(record.points_for),
        points_against: Set(record.points_against),
        playoff_result: Set(record.playoff_result.map(|p| p.as_str().to_string())),
        draft_data: Set(record.draft_data.as_ref().map(ToString::to_string)),
        roster_data: Set(record.roster_data.as_ref().map(ToString::to_string)),
        weekly_scores: Set(serde_json::to_string(&record.weekly_scores).ok()),
        transactions: Set(Some(record.transactions.to_string())),
        settings: Set((!record.settings.is_null()).then(|| record.settings.to_string())),
        created_at: Set(Some(chrono::Utc::now().to_rfc3339())),
        ..Default::default()
    }
}

impl TeamSeasonRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts or replaces the row keyed by (league, year, owner name).
    pub async fn upsert(&self, league_id: i32, record: &CanonicalRecord) -> Result<()> {
        TeamSeasons::insert(to_active(league_id, record))
            .on_conflict(
                OnConflict::columns([
                    team_seasons::Column::LeagueId,
                    team_seasons::Column::SeasonYear,
                    team_seasons::Column::OwnerName,
                ])
                .update_columns([
                    team_seasons::Column::TeamName,
                    team_seasons::Column::OwnerUserId,
                    team_seasons::Column::FinalStanding,
                    team_seasons::Column::Wins,
                    team_seasons::Column::Losses,
                    team_seasons::Column::Ties,
                    team_seasons::Column::PointsFor,
                    team_seasons::Column::PointsAgainst,
                    team_seasons::Column::PlayoffResult,
                    team_seasons::Column::DraftData,
                    team_seasons::Column::RosterData,
                    team_seasons::Column::WeeklyScores,
                    team_seasons::Column::Transactions,
                    team_seasons::Column::Settings,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn bulk_create(&self, league_id: i32, records: &[CanonicalRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        TeamSeasons::insert_many(records.iter().map(|r| to_active(league_id, r)))
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn delete_season(&self, league_id: i32, year: i32) -> Result<u64> {
        let result = TeamSeasons::delete_many()
            .filter(team_seasons::Column::LeagueId.eq(league_id))
            .filter(team_seasons::Column::SeasonYear.eq(year))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn count_season(&self, league_id: i32, year: i32) -> Result<u64> {
        let count = TeamSeasons::find()
            .filter(team_seasons::Column::LeagueId.eq(league_id))
            .filter(team_seasons::Column::SeasonYear.eq(year))
            .count(&self.conn)
            .await?;
        Ok(count)
    }

    pub async fn for_league(&self, league_id: i32) -> Result<Vec<team_seasons::Model>> {
        Ok(TeamSeasons::find()
            .filter(team_seasons::Column::LeagueId.eq(league_id))
            .order_by_asc(team_seasons::Column::SeasonYear)
            .order_by_asc(team_seasons::Column::OwnerName)
            .all(&self.conn)
            .await?)
    }
}
