//! Integration tests for the health analyzer against a real store.
//!
//! Seasons are seeded through the import pipeline so the analyzer sees rows
//! exactly as an import would leave them. The analysis year is pinned so the
//! ended/in-progress split never depends on the wall clock.

use leaguevault::db::Store;
use leaguevault::domain::{LeagueId, UserId};
use leaguevault::models::season::{MatchupGame, PlayoffOutcome, SeasonData, TeamRecord};
use leaguevault::providers::{
    Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef,
};
use leaguevault::services::{
    HealthError, HealthService, HealthStatus, ImportRequest, ImportService,
    SeaOrmHealthService, SeaOrmImportService,
};
use std::sync::Arc;

async fn temp_store() -> Store {
    let db_path = std::env::temp_dir().join(format!(
        "leaguevault-health-test-{}.db",
        uuid::Uuid::new_v4()
    ));
    Store::with_pool_options(&format!("sqlite:{}", db_path.display()), 5, 1)
        .await
        .expect("Failed to create store")
}

fn season(year: i32) -> SeasonData {
    let owners = ["Mike Smith", "Al Borland", "Tim Taylor", "Wilson Wilson"];
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
        data.matchups.insert(
            week,
            vec![
                MatchupGame {
                    week,
                    home_id: "1".to_string(),
                    home_points: 110.0,
                    away_id: Some("2".to_string()),
                    away_points: 95.0,
                    is_playoffs: false,
                    is_consolation: false,
                },
                MatchupGame {
                    week,
                    home_id: "3".to_string(),
                    home_points: 104.0,
                    away_id: Some("4".to_string()),
                    away_points: 99.0,
                    is_playoffs: false,
                    is_consolation: false,
                },
            ],
        );
    }
    data.playoff_results
        .insert("1".to_string(), PlayoffOutcome::Champion);
    data
}

struct FixedAdapter {
    seasons: Vec<SeasonData>,
}

#[async_trait::async_trait]
impl ProviderAdapter for FixedAdapter {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn discover(
        &self,
        _league_ref: &str,
        _credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        Ok(Discovery {
            name: "Health League".to_string(),
            sport: "football".to_string(),
            seasons: self
                .seasons
                .iter()
                .map(|s| SeasonRef {
                    year: s.season_year,
                    league_key: s.season_year.to_string(),
                })
                .collect(),
        })
    }

    async fn import_season(
        &self,
        season: &SeasonRef,
        _credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError> {
        self.seasons
            .iter()
            .find(|s| s.season_year == season.year)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(season.year.to_string()))
    }
}

async fn import_league(store: &Store, seasons: Vec<SeasonData>) -> LeagueId {
    let (events, _receiver) = tokio::sync::broadcast::channel(64);
    let service =
        SeaOrmImportService::with_adapter(store.clone(), events, Arc::new(FixedAdapter { seasons }));
    let outcome = service
        .run_full_import(ImportRequest {
            provider: "fixed".to_string(),
            league_ref: "1".to_string(),
            user_id: UserId::new(1),
            credentials: Credentials::None,
            display_name: None,
            target_league_id: None,
            selected_seasons: None,
        })
        .await
        .expect("seed import");
    outcome.league_id
}

#[tokio::test]
async fn complete_history_scores_green() {
    let store = temp_store().await;
    let league_id =
        import_league(&store, vec![season(2021), season(2022), season(2023)]).await;

    let service = SeaOrmHealthService::with_current_year(store, 2024);
    let report = service.analyze_league(league_id).await.expect("report");

    assert_eq!(report.overall_score, 100);
    assert_eq!(report.overall_status, HealthStatus::Green);
    assert_eq!(report.season_count, 3);
    assert_eq!(report.year_range, Some((2021, 2023)));
    assert!(report.missing_years.is_empty());
    assert!(report.issues.is_empty());
}

#[tokio::test]
async fn gap_years_drag_the_overall_score_down() {
    let store = temp_store().await;
    let league_id = import_league(&store, vec![season(2019), season(2023)]).await;

    let service = SeaOrmHealthService::with_current_year(store, 2024);
    let report = service.analyze_league(league_id).await.expect("report");

    assert_eq!(report.missing_years, vec![2020, 2021, 2022]);
    assert_eq!(report.overall_status, HealthStatus::Red);
    // The stored seasons themselves are clean.
    assert_eq!(report.per_season.get(&2019).expect("2019").score, 100);
    assert_eq!(report.per_season.get(&2023).expect("2023").score, 100);
}

#[tokio::test]
async fn unknown_league_is_an_error() {
    let store = temp_store().await;
    let service = SeaOrmHealthService::with_current_year(store, 2024);

    let result = service.analyze_league(LeagueId::new(999)).await;
    assert!(matches!(result, Err(HealthError::LeagueNotFound(_))));
}
