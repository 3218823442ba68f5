//! Integration tests for the import orchestrator.
//!
//! Each test drives `SeaOrmImportService` against a scripted provider adapter
//! and a throwaway sqlite database, then asserts on the persisted job and
//! team-season rows.

use leaguevault::db::Store;
use leaguevault::domain::{LeagueId, UserId};
use leaguevault::models::season::{MatchupGame, PlayoffOutcome, SeasonData, TeamRecord};
use leaguevault::providers::{
    Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef,
};
use leaguevault::services::{ImportError, ImportRequest, ImportService, SeaOrmImportService};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

async fn temp_store() -> Store {
    let db_path = std::env::temp_dir().join(format!(
        "leaguevault-import-test-{}.db",
        uuid::Uuid::new_v4()
    ));
    Store::with_pool_options(&format!("sqlite:{}", db_path.display()), 5, 1)
        .await
        .expect("Failed to create store")
}

/// Builds one fully-played season: 13 weeks, every team scheduled every week,
/// the first team crowned champion.
fn season(year: i32, owners: &[&str]) -> SeasonData {
    let mut data = SeasonData::new(year);
    for (i, owner) in owners.iter().enumerate() {
        data.teams.push(TeamRecord {
            team_id: (i + 1).to_string(),
            team_name: format!("Team {owner}"),
            owner_name: (*owner).to_string(),
            wins: 8,
            losses: 5,
            ties: 0,
            points_for: 1500.0 + i as f64 * 10.0,
            points_against: 1450.0,
            final_standing: Some(i as i32 + 1),
            roster: None,
        });
    }
    for week in 1..=13 {
        let mut games = Vec::new();
        for pair in data.teams.chunks(2) {
            games.push(MatchupGame {
                week,
                home_id: pair[0].team_id.clone(),
                home_points: 110.0,
                away_id: pair.get(1).map(|t| t.team_id.clone()),
                away_points: 95.0,
                is_playoffs: false,
                is_consolation: false,
            });
        }
        data.matchups.insert(week, games);
    }
    if let Some(first) = data.teams.first() {
        data.playoff_results
            .insert(first.team_id.clone(), PlayoffOutcome::Champion);
    }
    data
}

/// Scripted adapter: fixed discovery, per-year season payloads, optional
/// failure injection. `degraded_first_fetch` years return a degenerate
/// payload on their first fetch only, to exercise the repair pass.
struct ScriptedAdapter {
    league_name: String,
    seasons: Vec<SeasonRef>,
    data: HashMap<i32, SeasonData>,
    fail_discovery: Option<String>,
    failing_years: Vec<i32>,
    degraded_first_fetch: HashMap<i32, SeasonData>,
    fetched_once: Mutex<HashSet<i32>>,
}

impl ScriptedAdapter {
    fn new(league_name: &str, seasons: Vec<SeasonData>) -> Self {
        let refs = seasons
            .iter()
            .map(|s| SeasonRef {
                year: s.season_year,
                league_key: format!("league-{}", s.season_year),
            })
            .collect();
        let data = seasons.into_iter().map(|s| (s.season_year, s)).collect();
        Self {
            league_name: league_name.to_string(),
            seasons: refs,
            data,
            fail_discovery: None,
            failing_years: Vec::new(),
            degraded_first_fetch: HashMap::new(),
            fetched_once: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn discover(
        &self,
        _league_ref: &str,
        _credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        if let Some(message) = &self.fail_discovery {
            return Err(ProviderError::Auth(message.clone()));
        }
        Ok(Discovery {
            name: self.league_name.clone(),
            sport: "football".to_string(),
            seasons: self.seasons.clone(),
        })
    }

    async fn import_season(
        &self,
        season: &SeasonRef,
        _credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError> {
        if self.failing_years.contains(&season.year) {
            return Err(ProviderError::Fetch(format!(
                "standings unavailable for {}",
                season.year
            )));
        }
        if let Some(degraded) = self.degraded_first_fetch.get(&season.year) {
            let mut fetched = self.fetched_once.lock().expect("lock poisoned");
            if fetched.insert(season.year) {
                return Ok(degraded.clone());
            }
        }
        self.data
            .get(&season.year)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("season {}", season.year)))
    }
}

fn service(store: Store, adapter: ScriptedAdapter) -> SeaOrmImportService {
    let (events, _receiver) = tokio::sync::broadcast::channel(128);
    SeaOrmImportService::with_adapter(store, events, Arc::new(adapter))
}

fn request(league_ref: &str) -> ImportRequest {
    ImportRequest {
        provider: "scripted".to_string(),
        league_ref: league_ref.to_string(),
        user_id: UserId::new(7),
        credentials: Credentials::None,
        display_name: None,
        target_league_id: None,
        selected_seasons: None,
    }
}

const OWNERS: &[&str] = &["Mike Smith", "Al Borland", "Tim Taylor", "Wilson Wilson"];

#[tokio::test]
async fn full_import_persists_every_season() {
    let store = temp_store().await;
    let adapter = ScriptedAdapter::new(
        "Test Dynasty",
        vec![season(2021, OWNERS), season(2022, OWNERS), season(2023, OWNERS)],
    );
    let service = service(store.clone(), adapter);

    let outcome = service
        .run_full_import(request("12345"))
        .await
        .expect("import should complete");

    assert_eq!(outcome.league_name, "Test Dynasty");
    assert_eq!(outcome.seasons_imported, vec![2021, 2022, 2023]);
    assert_eq!(outcome.total_seasons, 3);
    assert!(outcome.repaired_seasons.is_empty());

    let rows = store
        .team_seasons_for_league(outcome.league_id.value())
        .await
        .expect("rows");
    assert_eq!(rows.len(), 12);

    let job = store
        .get_job(&outcome.import_id)
        .await
        .expect("job query")
        .expect("job row");
    assert_eq!(job.status, "COMPLETE");
    assert_eq!(job.progress_pct, 100);
    assert_eq!(job.seasons_found, 3);
    assert!(job.completed_at.is_some());
    assert!(job.error_log.is_none());
}

#[tokio::test]
async fn reimport_is_idempotent() {
    let store = temp_store().await;

    let outcome = service(
        store.clone(),
        ScriptedAdapter::new("Keeper League", vec![season(2022, OWNERS), season(2023, OWNERS)]),
    )
    .run_full_import(request("12345"))
    .await
    .expect("first import");

    let second = service(
        store.clone(),
        ScriptedAdapter::new("Keeper League", vec![season(2022, OWNERS), season(2023, OWNERS)]),
    )
    .run_full_import(request("12345"))
    .await
    .expect("second import");

    // Same league by case-insensitive name, and no duplicated rows.
    assert_eq!(second.league_id, outcome.league_id);
    let rows = store
        .team_seasons_for_league(outcome.league_id.value())
        .await
        .expect("rows");
    assert_eq!(rows.len(), 8);
}

#[tokio::test]
async fn discovery_failure_marks_job_failed() {
    let store = temp_store().await;
    let mut adapter = ScriptedAdapter::new("Broken", vec![]);
    adapter.fail_discovery = Some("token expired".to_string());

    let result = service(store.clone(), adapter)
        .run_full_import(request("12345"))
        .await;

    assert!(matches!(
        result,
        Err(ImportError::Provider(ProviderError::Auth(_)))
    ));

    let jobs = store.list_jobs(1).await.expect("jobs");
    let job = jobs.first().expect("job row");
    assert_eq!(job.status, "FAILED");
    let log = job.error_log.as_deref().expect("error log");
    assert!(log.contains("token expired"), "log was: {log}");
}

#[tokio::test]
async fn failed_season_is_logged_but_job_completes() {
    let store = temp_store().await;
    let mut adapter = ScriptedAdapter::new(
        "Spotty History",
        vec![season(2021, OWNERS), season(2022, OWNERS), season(2023, OWNERS)],
    );
    adapter.failing_years = vec![2022];

    let outcome = service(store.clone(), adapter)
        .run_full_import(request("12345"))
        .await
        .expect("import should still complete");

    assert_eq!(outcome.seasons_imported, vec![2021, 2023]);

    let job = store
        .get_job(&outcome.import_id)
        .await
        .expect("job query")
        .expect("job row");
    assert_eq!(job.status, "COMPLETE");
    let log = job.error_log.as_deref().expect("error log");
    assert!(log.contains("season 2022"), "log was: {log}");

    let rows = store
        .team_seasons_for_league(outcome.league_id.value())
        .await
        .expect("rows");
    assert!(rows.iter().all(|r| r.season_year != 2022));
}

#[tokio::test]
async fn partially_saved_season_is_repaired() {
    let store = temp_store().await;

    // Twelve expected teams but only three distinct owners on the first
    // fetch: the unique key collapses them to three rows, which trips the
    // less-than-half verification threshold.
    let mut dup_owners = vec!["Dup Owner"; 10];
    dup_owners.push("Al Borland");
    dup_owners.push("Tim Taylor");
    let twelve: Vec<&str> = vec![
        "Mike Smith",
        "Al Borland",
        "Tim Taylor",
        "Wilson Wilson",
        "Jill Taylor",
        "Brad Taylor",
        "Randy Taylor",
        "Mark Taylor",
        "Heidi Keppert",
        "Harry Turner",
        "Benny Baroni",
        "Marty Taylor",
    ];

    let mut adapter = ScriptedAdapter::new("Repair League", vec![season(2023, &twelve)]);
    adapter
        .degraded_first_fetch
        .insert(2023, season(2023, &dup_owners));

    let outcome = service(store.clone(), adapter)
        .run_full_import(request("12345"))
        .await
        .expect("import should complete");

    assert_eq!(outcome.repaired_seasons, vec![2023]);
    let rows = store
        .team_seasons_for_league(outcome.league_id.value())
        .await
        .expect("rows");
    assert_eq!(rows.len(), 12);

    let job = store
        .get_job(&outcome.import_id)
        .await
        .expect("job query")
        .expect("job row");
    assert_eq!(job.status, "COMPLETE");
    assert_eq!(job.repaired_seasons.as_deref(), Some("[2023]"));
}

#[tokio::test]
async fn merge_target_must_exist() {
    let store = temp_store().await;
    let adapter = ScriptedAdapter::new("Orphan", vec![season(2023, OWNERS)]);

    let mut req = request("12345");
    req.target_league_id = Some(LeagueId::new(4242));

    let result = service(store.clone(), adapter).run_full_import(req).await;
    assert!(matches!(result, Err(ImportError::LeagueNotFound(_))));

    let jobs = store.list_jobs(1).await.expect("jobs");
    assert_eq!(jobs.first().expect("job row").status, "FAILED");
}

#[tokio::test]
async fn importer_row_is_tagged_by_display_name() {
    let store = temp_store().await;
    let adapter = ScriptedAdapter::new("Identity League", vec![season(2023, OWNERS)]);

    let mut req = request("12345");
    req.display_name = Some("Smith".to_string());

    let outcome = service(store.clone(), adapter)
        .run_full_import(req)
        .await
        .expect("import");

    let rows = store
        .team_seasons_for_league(outcome.league_id.value())
        .await
        .expect("rows");
    for row in &rows {
        if row.owner_name == "Mike Smith" {
            assert_eq!(row.owner_user_id, Some(7));
        } else {
            assert_eq!(row.owner_user_id, None);
        }
    }
}

#[tokio::test]
async fn selected_seasons_limit_the_import() {
    let store = temp_store().await;
    let adapter = ScriptedAdapter::new(
        "Partial League",
        vec![season(2021, OWNERS), season(2022, OWNERS), season(2023, OWNERS)],
    );

    let mut req = request("12345");
    req.selected_seasons = Some(vec![2022]);

    let outcome = service(store.clone(), adapter)
        .run_full_import(req)
        .await
        .expect("import");

    assert_eq!(outcome.total_seasons, 1);
    assert_eq!(outcome.seasons_imported, vec![2022]);

    let rows = store
        .team_seasons_for_league(outcome.league_id.value())
        .await
        .expect("rows");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.season_year == 2022));
}
