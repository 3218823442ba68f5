//! `SeaORM` implementation of the `ImportService` trait.
//!
//! The orchestrator drives one job through SCANNING -> IMPORTING ->
//! {COMPLETE | FAILED}. Discovery failure is fatal; per-season failures are
//! logged to the job and the loop continues; per-team upsert failures are
//! skipped outright. After the season loop a verification pass re-imports any
//! season that persisted less than half of its expected teams.

use crate::constants::{progress, repair};
use crate::db::Store;
use crate::domain::LeagueId;
use crate::domain::events::ImportEvent;
use crate::entities::{import_jobs, leagues};
use crate::normalize::{CanonicalRecord, canonical_records};
use crate::providers::{
    Credentials, ProviderAdapter, ProviderError, SeasonRef, adapter_for,
};
use crate::services::archive::ArchiveWriter;
use crate::services::identity;
use crate::services::import_service::{
    ImportError, ImportOutcome, ImportRequest, ImportService,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// SeaORM-based implementation of [`ImportService`].
pub struct SeaOrmImportService {
    store: Store,
    events: tokio::sync::broadcast::Sender<ImportEvent>,
    adapter_override: Option<Arc<dyn ProviderAdapter>>,
    archive_raw: bool,
}

fn progress_after(done: usize, total: usize) -> i32 {
    if total == 0 {
        return progress::AFTER_DISCOVERY + progress::SEASON_LOOP_SPAN;
    }
    let done = done as i64;
    let total = total as i64;
    let span = i64::from(progress::SEASON_LOOP_SPAN);
    let pct = i64::from(progress::AFTER_DISCOVERY) + (span * done + total / 2) / total;
    i32::try_from(pct).unwrap_or(100)
}

impl SeaOrmImportService {
    /// Creates a new instance of the service.
    #[must_use]
    pub fn new(store: Store, events: tokio::sync::broadcast::Sender<ImportEvent>) -> Self {
        Self {
            store,
            events,
            adapter_override: None,
            archive_raw: true,
        }
    }

    /// Disables raw payload archiving when the config opts out.
    #[must_use]
    pub const fn archive_raw(mut self, enabled: bool) -> Self {
        self.archive_raw = enabled;
        self
    }

    /// Routes every provider name to the given adapter. Test seam.
    #[must_use]
    pub fn with_adapter(
        store: Store,
        events: tokio::sync::broadcast::Sender<ImportEvent>,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Self {
        Self {
            store,
            events,
            adapter_override: Some(adapter),
            archive_raw: true,
        }
    }

    fn emit(&self, event: ImportEvent) {
        let _ = self.events.send(event);
    }

    fn adapter(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapter_override.clone().or_else(|| {
            let archive = self
                .archive_raw
                .then(|| ArchiveWriter::new(self.store.clone()));
            adapter_for(provider, archive)
        })
    }

    async fn resolve_league(
        &self,
        request: &ImportRequest,
        name: &str,
        sport: &str,
    ) -> Result<leagues::Model, ImportError> {
        if let Some(id) = request.target_league_id {
            return self
                .store
                .get_league(id.value())
                .await?
                .ok_or(ImportError::LeagueNotFound(id));
        }
        if let Some(league) = self.store.find_league_by_name_ci(name).await? {
            return Ok(league);
        }
        let id = self.store.create_league(name, sport).await?;
        self.store
            .get_league(id)
            .await?
            .ok_or_else(|| ImportError::Internal("league row vanished after create".to_string()))
    }

    /// Names the importer is known by: their stated display name plus any
    /// saved aliases for this league.
    async fn known_names(&self, league_id: i32, request: &ImportRequest) -> Vec<String> {
        let mut names = self
            .store
            .owner_aliases_for(league_id, request.user_id.value())
            .await
            .unwrap_or_default();
        if let Some(display) = &request.display_name {
            names.insert(0, display.clone());
        }
        names
    }

    /// Fetches one season and normalizes it, tagging the importer's row.
    async fn fetch_records(
        &self,
        adapter: &dyn ProviderAdapter,
        season: &SeasonRef,
        credentials: &Credentials,
        user_id: i64,
        known_names: &[String],
    ) -> Result<Vec<CanonicalRecord>, ProviderError> {
        let data = adapter.import_season(season, credentials).await?;
        let mut records = canonical_records(&data);

        let owner_names: Vec<String> =
            data.teams.iter().map(|t| t.owner_name.clone()).collect();
        if let Some(index) = identity::resolve_owner(known_names, &owner_names)
            && let Some(record) = records.get_mut(index)
        {
            record.owner_user_id = Some(user_id);
        }
        Ok(records)
    }

    async fn run_job(
        &self,
        job_id: &str,
        request: &ImportRequest,
    ) -> Result<ImportOutcome, ImportError> {
        let adapter = self
            .adapter(&request.provider)
            .ok_or_else(|| ImportError::UnknownProvider(request.provider.clone()))?;

        self.emit(ImportEvent::ScanStarted {
            job_id: job_id.to_string(),
            provider: request.provider.clone(),
        });

        let discovery = adapter
            .discover(&request.league_ref, &request.credentials)
            .await?;

        let mut seasons = discovery.seasons;
        if let Some(selected) = &request.selected_seasons {
            seasons.retain(|s| selected.contains(&s.year));
        }
        let total = seasons.len();

        let league = self
            .resolve_league(request, &discovery.name, &discovery.sport)
            .await?;
        self.store
            .ensure_league_member(league.id, request.user_id.value(), "member")
            .await?;

        let seasons_found = i32::try_from(total).unwrap_or(i32::MAX);
        self.store
            .mark_job_importing(job_id, seasons_found, league.id, progress::AFTER_DISCOVERY)
            .await?;
        self.emit(ImportEvent::ScanFinished {
            job_id: job_id.to_string(),
            seasons_found,
        });
        info!(
            job_id,
            league = %league.name,
            seasons = total,
            "discovery complete, importing"
        );

        let known_names = self.known_names(league.id, request).await;

        let mut imported = Vec::new();
        let mut failed = 0i32;
        let mut expected: BTreeMap<i32, usize> = BTreeMap::new();

        for (index, season) in seasons.iter().enumerate() {
            match self
                .fetch_records(
                    adapter.as_ref(),
                    season,
                    &request.credentials,
                    request.user_id.value(),
                    &known_names,
                )
                .await
            {
                Ok(records) => {
                    for record in &records {
                        // One malformed record must never cost the season's
                        // other teams.
                        if let Err(e) = self.store.upsert_team_season(league.id, record).await {
                            warn!(
                                year = season.year,
                                owner = %record.owner_name,
                                "team upsert skipped: {e}"
                            );
                        }
                    }
                    expected.insert(season.year, records.len());
                    imported.push(season.year);
                    self.emit(ImportEvent::SeasonImported {
                        job_id: job_id.to_string(),
                        year: season.year,
                        teams: i32::try_from(records.len()).unwrap_or(i32::MAX),
                    });
                }
                Err(e) => {
                    failed += 1;
                    self.store
                        .append_job_error(job_id, &format!("season {}: {e}", season.year))
                        .await?;
                    self.emit(ImportEvent::SeasonFailed {
                        job_id: job_id.to_string(),
                        year: season.year,
                        message: e.to_string(),
                    });
                }
            }
            self.store
                .set_job_progress(job_id, progress_after(index + 1, total))
                .await?;
        }

        let repaired = self
            .repair_partial_seasons(job_id, request, adapter.as_ref(), league.id, &seasons, &expected, &known_names)
            .await?;

        self.store.complete_job(job_id, &imported, &repaired).await?;
        self.emit(ImportEvent::ImportFinished {
            job_id: job_id.to_string(),
            seasons_imported: i32::try_from(imported.len()).unwrap_or(i32::MAX),
            seasons_failed: failed,
        });

        Ok(ImportOutcome {
            import_id: job_id.to_string(),
            league_id: LeagueId::new(league.id),
            league_name: league.name,
            seasons_imported: imported,
            repaired_seasons: repaired,
            total_seasons: total,
        })
    }

    /// Post-loop verification. A season that persisted fewer than half of its
    /// expected teams is wiped and re-imported from scratch; the re-imported
    /// rows are bulk-created since the slate was just cleared.
    #[allow(clippy::too_many_arguments)]
    async fn repair_partial_seasons(
        &self,
        job_id: &str,
        request: &ImportRequest,
        adapter: &dyn ProviderAdapter,
        league_id: i32,
        seasons: &[SeasonRef],
        expected: &BTreeMap<i32, usize>,
        known_names: &[String],
    ) -> Result<Vec<i32>, ImportError> {
        let mut repaired = Vec::new();

        for (&year, &expected_count) in expected {
            if i32::try_from(expected_count).unwrap_or(i32::MAX) < repair::MIN_EXPECTED_TEAMS {
                continue;
            }
            let persisted = self.store.count_season_rows(league_id, year).await?;
            if persisted * 2 >= u64::try_from(expected_count).unwrap_or(u64::MAX) {
                continue;
            }
            let Some(season) = seasons.iter().find(|s| s.year == year) else {
                continue;
            };
            warn!(
                year,
                persisted, expected_count, "partially saved season, re-importing"
            );

            self.store.delete_season_rows(league_id, year).await?;
            match self
                .fetch_records(
                    adapter,
                    season,
                    &request.credentials,
                    request.user_id.value(),
                    known_names,
                )
                .await
            {
                Ok(records) => {
                    self.store
                        .bulk_create_team_seasons(league_id, &records)
                        .await?;
                    repaired.push(year);
                    self.emit(ImportEvent::SeasonRepaired {
                        job_id: job_id.to_string(),
                        year,
                    });
                }
                Err(e) => {
                    self.store
                        .append_job_error(job_id, &format!("repair {year}: {e}"))
                        .await?;
                }
            }
        }
        Ok(repaired)
    }
}

#[async_trait::async_trait]
impl ImportService for SeaOrmImportService {
    async fn run_full_import(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.store
            .create_job(&job_id, request.user_id.value(), &request.provider, &request.league_ref)
            .await?;

        match self.run_job(&job_id, &request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Err(db_err) = self.store.fail_job(&job_id, &e.to_string()).await {
                    error!(job_id, "failed to record job failure: {db_err}");
                }
                self.emit(ImportEvent::ImportFailed {
                    job_id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn list_jobs(&self, limit: u64) -> Result<Vec<import_jobs::Model>, ImportError> {
        Ok(self.store.list_jobs(limit).await?)
    }

    async fn get_job(&self, id: &str) -> Result<Option<import_jobs::Model>, ImportError> {
        Ok(self.store.get_job(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_moves_from_ten_to_ninety() {
        assert_eq!(progress_after(0, 12), 10);
        assert_eq!(progress_after(3, 12), 30);
        assert_eq!(progress_after(6, 12), 50);
        assert_eq!(progress_after(12, 12), 90);
    }

    #[test]
    fn progress_rounds_to_nearest() {
        // 10 + round(80 / 3) = 10 + 27
        assert_eq!(progress_after(1, 3), 37);
        // 10 + round(160 / 3) = 10 + 53
        assert_eq!(progress_after(2, 3), 63);
    }

    #[test]
    fn empty_season_list_jumps_to_ninety() {
        assert_eq!(progress_after(0, 0), 90);
    }
}
