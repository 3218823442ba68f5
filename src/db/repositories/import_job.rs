use crate::domain::JobStatus;
use crate::entities::{import_jobs, prelude::*};
use anyhow::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

pub struct ImportJobRepository {
    conn: DatabaseConnection,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl ImportJobRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        id: &str,
        owner_user_id: i64,
        provider: &str,
        league_ref: &str,
    ) -> Result<()> {
        let model = import_jobs::ActiveModel {
            id: Set(id.to_string()),
            owner_user_id: Set(owner_user_id),
            provider: Set(provider.to_string()),
            league_ref: Set(league_ref.to_string()),
            status: Set(JobStatus::Scanning.as_str().to_string()),
            seasons_found: Set(0),
            seasons_imported: Set(None),
            progress_pct: Set(0),
            error_log: Set(None),
            canonical_league_id: Set(None),
            repaired_seasons: Set(None),
            created_at: Set(Some(now())),
            completed_at: Set(None),
        };
        ImportJobs::insert(model)
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<import_jobs::Model>> {
        Ok(ImportJobs::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_recent(&self, limit: u64) -> Result<Vec<import_jobs::Model>> {
        Ok(ImportJobs::find()
            .order_by_desc(import_jobs::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    pub async fn mark_importing(
        &self,
        id: &str,
        seasons_found: i32,
        league_id: i32,
        progress_pct: i32,
    ) -> Result<()> {
        ImportJobs::update_many()
            .col_expr(
                import_jobs::Column::Status,
                sea_orm::sea_query::Expr::value(JobStatus::Importing.as_str()),
            )
            .col_expr(
                import_jobs::Column::SeasonsFound,
                sea_orm::sea_query::Expr::value(seasons_found),
            )
            .col_expr(
                import_jobs::Column::CanonicalLeagueId,
                sea_orm::sea_query::Expr::value(league_id),
            )
            .col_expr(
                import_jobs::Column::ProgressPct,
                sea_orm::sea_query::Expr::value(progress_pct),
            )
            .filter(import_jobs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn set_progress(&self, id: &str, progress_pct: i32) -> Result<()> {
        ImportJobs::update_many()
            .col_expr(
                import_jobs::Column::ProgressPct,
                sea_orm::sea_query::Expr::value(progress_pct),
            )
            .filter(import_jobs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Appends one {message, timestamp} entry to the job's error log.
    pub async fn append_error(&self, id: &str, message: &str) -> Result<()> {
        let Some(job) = self.get(id).await? else {
            return Ok(());
        };
        let mut log: Vec<serde_json::Value> = job
            .error_log
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        log.push(serde_json::json!({
            "message": message,
            "timestamp": now(),
        }));

        let mut active: import_jobs::ActiveModel = job.into();
        active.error_log = Set(Some(serde_json::to_string(&log)?));
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn complete(
        &self,
        id: &str,
        seasons_imported: &[i32],
        repaired_seasons: &[i32],
    ) -> Result<()> {
        let Some(job) = self.get(id).await? else {
            return Ok(());
        };
        let mut active: import_jobs::ActiveModel = job.into();
        active.status = Set(JobStatus::Complete.as_str().to_string());
        active.progress_pct = Set(100);
        active.seasons_imported = Set(Some(serde_json::to_string(seasons_imported)?));
        active.repaired_seasons = Set(if repaired_seasons.is_empty() {
            None
        } else {
            Some(serde_json::to_string(repaired_seasons)?)
        });
        active.completed_at = Set(Some(now()));
        active.update(&self.conn).await?;
        Ok(())
    }

    pub async fn fail(&self, id: &str, message: &str) -> Result<()> {
        self.append_error(id, message).await?;
        let Some(job) = self.get(id).await? else {
            return Ok(());
        };
        let mut active: import_jobs::ActiveModel = job.into();
        active.status = Set(JobStatus::Failed.as_str().to_string());
        active.completed_at = Set(Some(now()));
        active.update(&self.conn).await?;
        Ok(())
    }
}
