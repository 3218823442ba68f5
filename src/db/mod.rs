use crate::entities::{import_jobs, leagues, team_seasons};
use crate::normalize::CanonicalRecord;
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn league_repo(&self) -> repositories::league::LeagueRepository {
        repositories::league::LeagueRepository::new(self.conn.clone())
    }

    fn job_repo(&self) -> repositories::import_job::ImportJobRepository {
        repositories::import_job::ImportJobRepository::new(self.conn.clone())
    }

    fn team_season_repo(&self) -> repositories::team_season::TeamSeasonRepository {
        repositories::team_season::TeamSeasonRepository::new(self.conn.clone())
    }

    fn archive_repo(&self) -> repositories::archive::ArchiveRepository {
        repositories::archive::ArchiveRepository::new(self.conn.clone())
    }

    // Leagues

    pub async fn create_league(&self, name: &str, sport: &str) -> Result<i32> {
        self.league_repo().create(name, sport).await
    }

    pub async fn get_league(&self, id: i32) -> Result<Option<leagues::Model>> {
        self.league_repo().get(id).await
    }

    pub async fn find_league_by_name_ci(&self, name: &str) -> Result<Option<leagues::Model>> {
        self.league_repo().find_by_name_ci(name).await
    }

    pub async fn list_leagues(&self) -> Result<Vec<leagues::Model>> {
        self.league_repo().list_all().await
    }

    pub async fn ensure_league_member(
        &self,
        league_id: i32,
        user_id: i64,
        role: &str,
    ) -> Result<()> {
        self.league_repo().ensure_member(league_id, user_id, role).await
    }

    pub async fn replace_owner_aliases(
        &self,
        league_id: i32,
        owner_user_id: i64,
        aliases: &[String],
    ) -> Result<()> {
        self.league_repo()
            .replace_aliases(league_id, owner_user_id, aliases)
            .await
    }

    pub async fn owner_aliases_for(
        &self,
        league_id: i32,
        owner_user_id: i64,
    ) -> Result<Vec<String>> {
        self.league_repo()
            .aliases_for(league_id, owner_user_id)
            .await
    }

    // Import jobs

    pub async fn create_job(
        &self,
        id: &str,
        owner_user_id: i64,
        provider: &str,
        league_ref: &str,
    ) -> Result<()> {
        self.job_repo()
            .create(id, owner_user_id, provider, league_ref)
            .await
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<import_jobs::Model>> {
        self.job_repo().get(id).await
    }

    pub async fn list_jobs(&self, limit: u64) -> Result<Vec<import_jobs::Model>> {
        self.job_repo().list_recent(limit).await
    }

    pub async fn mark_job_importing(
        &self,
        id: &str,
        seasons_found: i32,
        league_id: i32,
        progress_pct: i32,
    ) -> Result<()> {
        self.job_repo()
            .mark_importing(id, seasons_found, league_id, progress_pct)
            .await
    }

    pub async fn set_job_progress(&self, id: &str, progress_pct: i32) -> Result<()> {
        self.job_repo().set_progress(id, progress_pct).await
    }

    pub async fn append_job_error(&self, id: &str, message: &str) -> Result<()> {
        self.job_repo().append_error(id, message).await
    }

    pub async fn complete_job(
        &self,
        id: &str,
        seasons_imported: &[i32],
        repaired_seasons: &[i32],
    ) -> Result<()> {
        self.job_repo()
            .complete(id, seasons_imported, repaired_seasons)
            .await
    }

    pub async fn fail_job(&self, id: &str, message: &str) -> Result<()> {
        self.job_repo().fail(id, message).await
    }

    // Team seasons

    pub async fn upsert_team_season(
        &self,
        league_id: i32,
        record: &CanonicalRecord,
    ) -> Result<()> {
        self.team_season_repo().upsert(league_id, record).await
    }

    pub async fn bulk_create_team_seasons(
        &self,
        league_id: i32,
        records: &[CanonicalRecord],
    ) -> Result<()> {
        self.team_season_repo().bulk_create(league_id, records).await
    }

    pub async fn delete_season_rows(&self, league_id: i32, year: i32) -> Result<u64> {
        self.team_season_repo().delete_season(league_id, year).await
    }

    pub async fn count_season_rows(&self, league_id: i32, year: i32) -> Result<u64> {
        self.team_season_repo().count_season(league_id, year).await
    }

    pub async fn team_seasons_for_league(
        &self,
        league_id: i32,
    ) -> Result<Vec<team_seasons::Model>> {
        self.team_season_repo().for_league(league_id).await
    }

    // Raw archive

    pub async fn insert_raw_record(
        &self,
        provider: &str,
        data_type: &str,
        event_ref: &str,
        payload: &str,
        record_count: i32,
    ) -> Result<()> {
        self.archive_repo()
            .insert(provider, data_type, event_ref, payload, record_count)
            .await
    }

    pub async fn raw_record_count(&self, provider: &str) -> Result<u64> {
        self.archive_repo().count_for_provider(provider).await
    }
}
