//! `SeaORM` implementation of the `HealthService` trait.
//!
//! Scoring is a pure pass over the league's stored rows; the only database
//! work is loading them. "Current year" is injected so scoring is
//! deterministic in tests and stable across a year boundary mid-analysis.

use crate::constants::health;
use crate::db::Store;
use crate::domain::LeagueId;
use crate::entities::team_seasons;
use crate::services::health_service::{
    HealthError, HealthIssue, HealthReport, HealthService, HealthStatus, IssueKind, SeasonHealth,
    Severity,
};
use chrono::Datelike;
use std::collections::{BTreeMap, HashMap, HashSet};

/// SeaORM-based implementation of [`HealthService`].
pub struct SeaOrmHealthService {
    store: Store,
    current_year: i32,
}

impl SeaOrmHealthService {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            current_year: chrono::Utc::now().year(),
        }
    }

    #[must_use]
    pub const fn with_current_year(store: Store, current_year: i32) -> Self {
        Self {
            store,
            current_year,
        }
    }
}

#[async_trait::async_trait]
impl HealthService for SeaOrmHealthService {
    async fn analyze_league(&self, league_id: LeagueId) -> Result<HealthReport, HealthError> {
        if self.store.get_league(league_id.value()).await?.is_none() {
            return Err(HealthError::LeagueNotFound(league_id));
        }
        let rows = self.store.team_seasons_for_league(league_id.value()).await?;
        Ok(analyze_seasons(&rows, self.current_year))
    }
}

const fn expected_games(year: i32) -> (i32, i32) {
    if year >= health::MODERN_ERA_START {
        health::GAMES_MODERN
    } else if year >= health::CLASSIC_ERA_START {
        health::GAMES_CLASSIC
    } else {
        health::GAMES_EARLY
    }
}

const fn games_played(row: &team_seasons::Model) -> i32 {
    row.wins + row.losses + row.ties
}

fn has_weekly_scores(row: &team_seasons::Model) -> bool {
    row.weekly_scores.as_deref().is_some_and(|raw| {
        serde_json::from_str::<Vec<serde_json::Value>>(raw).is_ok_and(|v| !v.is_empty())
    })
}

fn issue(kind: IssueKind, severity: Severity, year: Option<i32>, message: String) -> HealthIssue {
    HealthIssue {
        kind,
        severity,
        season_year: year,
        message,
    }
}

#[allow(clippy::too_many_lines)]
fn season_issues(
    year: i32,
    teams: &[&team_seasons::Model],
    modal_team_count: i32,
    current_year: i32,
) -> Vec<HealthIssue> {
    let mut issues = Vec::new();
    let ended = year < current_year;

    if year > current_year {
        issues.push(issue(
            IssueKind::FutureSeason,
            Severity::Medium,
            Some(year),
            format!("season {year} is in the future"),
        ));
        return issues;
    }

    let season_games = teams.iter().map(|t| games_played(t)).max().unwrap_or(0);
    let (min_games, max_games) = expected_games(year);
    if ended && (season_games < min_games || season_games > max_games) {
        issues.push(issue(
            IssueKind::GameCountAnomaly,
            Severity::Medium,
            Some(year),
            format!(
                "{year}: {season_games} games played, expected {min_games}-{max_games}"
            ),
        ));
    }
    if !ended && season_games < min_games {
        issues.push(issue(
            IssueKind::PartialCurrentSeason,
            Severity::Info,
            Some(year),
            format!("{year} is still in progress ({season_games} games so far)"),
        ));
    }

    if ended {
        let zero_count = teams.iter().filter(|t| t.points_for == 0.0).count();
        if zero_count == teams.len() {
            issues.push(issue(
                IssueKind::ZeroPoints,
                Severity::High,
                Some(year),
                format!("{year}: every team has zero points scored"),
            ));
        } else if zero_count > 0 {
            issues.push(issue(
                IssueKind::ZeroPoints,
                Severity::Medium,
                Some(year),
                format!("{year}: {zero_count} of {} teams have zero points", teams.len()),
            ));
        }

        if teams.iter().all(|t| games_played(t) == 0) {
            issues.push(issue(
                IssueKind::AllZeroRecords,
                Severity::Medium,
                Some(year),
                format!("{year}: no team has any recorded result"),
            ));
        }

        let champions = teams
            .iter()
            .filter(|t| t.playoff_result.as_deref() == Some("champion"))
            .count();
        if champions > 1 {
            issues.push(issue(
                IssueKind::MultipleChampions,
                Severity::Medium,
                Some(year),
                format!("{year}: {champions} teams recorded as champion"),
            ));
        } else if champions == 0 {
            issues.push(issue(
                IssueKind::NoChampion,
                Severity::Low,
                Some(year),
                format!("{year}: no champion recorded"),
            ));
        }
    }

    let scored: Vec<f64> = teams
        .iter()
        .filter(|t| t.points_for > 0.0)
        .map(|t| t.points_for)
        .collect();
    if scored.len() >= health::OUTLIER_MIN_TEAMS {
        let n = scored.len() as f64;
        let mean = scored.iter().sum::<f64>() / n;
        let variance = scored.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let sigma = variance.sqrt();
        if sigma > 0.0
            && scored
                .iter()
                .any(|p| (p - mean).abs() > health::OUTLIER_SIGMA * sigma)
        {
            issues.push(issue(
                IssueKind::PointsOutlier,
                Severity::Low,
                Some(year),
                format!("{year}: a team's points total is a >3-sigma outlier"),
            ));
        }
    }

    let team_count = i32::try_from(teams.len()).unwrap_or(i32::MAX);
    if (team_count - modal_team_count).abs() > health::TEAM_COUNT_TOLERANCE {
        issues.push(issue(
            IssueKind::TeamCountAnomaly,
            Severity::Medium,
            Some(year),
            format!(
                "{year}: {team_count} teams, league mode is {modal_team_count}"
            ),
        ));
    }

    if teams
        .iter()
        .any(|t| games_played(t) > 0 && !has_weekly_scores(t))
    {
        issues.push(issue(
            IssueKind::MissingWeeklyScores,
            Severity::Low,
            Some(year),
            format!("{year}: teams with recorded results lack weekly scores"),
        ));
    }

    issues
}

fn cross_season_issues(
    grouped: &BTreeMap<i32, Vec<&team_seasons::Model>>,
) -> Vec<HealthIssue> {
    struct OwnerSpan {
        display: String,
        years: HashSet<i32>,
        total_games: i32,
    }

    let mut owners: HashMap<String, OwnerSpan> = HashMap::new();
    for (&year, teams) in grouped {
        for team in teams {
            let span = owners
                .entry(team.owner_name.trim().to_lowercase())
                .or_insert_with(|| OwnerSpan {
                    display: team.owner_name.clone(),
                    years: HashSet::new(),
                    total_games: 0,
                });
            span.years.insert(year);
            span.total_games += games_played(team);
        }
    }

    let total_seasons = grouped.len();
    let mut issues = Vec::new();
    for span in owners.values() {
        if total_seasons > health::ALIAS_MIN_TOTAL_SEASONS && span.years.len() == 1 {
            issues.push(issue(
                IssueKind::PossibleAlias,
                Severity::Info,
                None,
                format!(
                    "owner \"{}\" appears in only 1 of {total_seasons} seasons; possibly an un-merged alias",
                    span.display
                ),
            ));
        }
        let season_span = i32::try_from(span.years.len()).unwrap_or(i32::MAX);
        if span.years.len() >= health::SPARSE_OWNER_MIN_SEASONS
            && span.total_games < health::SPARSE_OWNER_GAMES_PER_SEASON * season_span
        {
            issues.push(issue(
                IssueKind::SparseOwnerData,
                Severity::Medium,
                None,
                format!(
                    "owner \"{}\" spans {season_span} seasons but has only {} recorded games",
                    span.display, span.total_games
                ),
            ));
        }
    }
    issues
}

/// Pure scorer over one league's stored rows.
#[must_use]
pub fn analyze_seasons(rows: &[team_seasons::Model], current_year: i32) -> HealthReport {
    let mut grouped: BTreeMap<i32, Vec<&team_seasons::Model>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.season_year).or_default().push(row);
    }

    if grouped.is_empty() {
        return HealthReport {
            overall_score: 100,
            overall_status: HealthStatus::Green,
            season_count: 0,
            year_range: None,
            missing_years: Vec::new(),
            issues: Vec::new(),
            per_season: BTreeMap::new(),
        };
    }

    let min_year = *grouped.keys().next().unwrap_or(&0);
    let max_year = *grouped.keys().next_back().unwrap_or(&0);

    let mut count_freq: HashMap<i32, usize> = HashMap::new();
    for teams in grouped.values() {
        let count = i32::try_from(teams.len()).unwrap_or(i32::MAX);
        *count_freq.entry(count).or_default() += 1;
    }
    let modal_team_count = count_freq
        .into_iter()
        .max_by_key(|&(count, freq)| (freq, count))
        .map_or(0, |(count, _)| count);

    let mut per_season = BTreeMap::new();
    let mut missing_years = Vec::new();
    let mut issues = Vec::new();

    for year in min_year..=max_year {
        if let Some(teams) = grouped.get(&year) {
            let season = season_issues(year, teams, modal_team_count, current_year);
            let penalty: i32 = season.iter().map(|i| i.severity.penalty()).sum();
            let score = (100 - penalty).max(0);
            per_season.insert(
                year,
                SeasonHealth {
                    score,
                    status: HealthStatus::from_score(score),
                },
            );
            issues.extend(season);
        } else {
            missing_years.push(year);
            issues.push(issue(
                IssueKind::MissingSeason,
                Severity::High,
                Some(year),
                format!("no data stored for {year}"),
            ));
            per_season.insert(
                year,
                SeasonHealth {
                    score: 0,
                    status: HealthStatus::Red,
                },
            );
        }
    }

    let cross = cross_season_issues(&grouped);

    let slots = per_season.len();
    let mean = per_season.values().map(|s| f64::from(s.score)).sum::<f64>() / slots as f64;
    let mut overall = mean.round() as i32;

    let mut kind_years: HashMap<IssueKind, HashSet<i32>> = HashMap::new();
    for item in &issues {
        if let Some(year) = item.season_year {
            kind_years.entry(item.kind).or_default().insert(year);
        }
    }
    for years in kind_years.values() {
        let ratio = years.len() as f64 / slots as f64;
        if ratio >= health::RECURRING_HEAVY_RATIO {
            overall -= health::RECURRING_HEAVY_PENALTY;
        } else if ratio >= health::RECURRING_LIGHT_RATIO {
            overall -= health::RECURRING_LIGHT_PENALTY;
        }
    }
    overall -= health::CROSS_SEASON_PENALTY * i32::try_from(cross.len()).unwrap_or(i32::MAX);
    let overall = overall.clamp(0, 100);

    issues.extend(cross);

    HealthReport {
        overall_score: overall,
        overall_status: HealthStatus::from_score(overall),
        season_count: grouped.len(),
        year_range: Some((min_year, max_year)),
        missing_years,
        issues,
        per_season,
    }
}
