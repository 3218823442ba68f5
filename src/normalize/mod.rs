//! Canonical normalization.
//!
//! Total functions from the provider-neutral [`SeasonData`] shape down to the
//! canonical team-season records the vault stores. Nothing here fails on
//! missing optional fields; absent values become 0/None.

pub mod playoffs;

use crate::models::season::{PlayoffOutcome, SeasonData, TeamRecord, WeeklyScore};
use std::collections::BTreeMap;

use crate::models::season::MatchupGame;

/// One fully-normalized team-season, ready to upsert under the composite key
/// (league, year, owner name). `owner_user_id` is filled in by the
/// orchestrator after owner resolution.
#[derive(Debug, Clone)]
pub struct CanonicalRecord {
    pub season_year: i32,
    pub team_name: String,
    pub owner_name: String,
    pub owner_user_id: Option<i64>,
    pub final_standing: Option<i32>,
    pub wins: i32,
    pub losses: i32,
    pub ties: i32,
    pub points_for: f64,
    pub points_against: f64,
    pub playoff_result: Option<PlayoffOutcome>,
    pub draft_data: Option<serde_json::Value>,
    pub roster_data: Option<serde_json::Value>,
    pub weekly_scores: Vec<WeeklyScore>,
    pub transactions: serde_json::Value,
    pub settings: serde_json::Value,
}

/// Coerces a provider id to its canonical string form.
///
/// Providers disagree on whether ids are numbers or strings, sometimes within
/// a single season's payloads.
#[must_use]
pub fn coerce_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Recombines split integer/decimal point totals (e.g. Sleeper's `fpts` and
/// `fpts_decimal` pair) into one float.
#[must_use]
pub fn merge_split_points(whole: Option<i64>, hundredths: Option<i64>) -> f64 {
    let whole = whole.unwrap_or(0) as f64;
    let frac = hundredths.unwrap_or(0) as f64 / 100.0;
    whole + frac
}

/// Derives a team's weekly score line by scanning each week's games for the
/// entry referencing it. Ids are compared as strings. Weeks where the team
/// does not appear are simply absent; partial coverage is fine.
#[must_use]
pub fn weekly_scores_for(
    team_id: &str,
    matchups: &BTreeMap<i32, Vec<MatchupGame>>,
) -> Vec<WeeklyScore> {
    let mut scores = Vec::new();
    for (week, games) in matchups {
        for game in games {
            if game.home_id == team_id {
                scores.push(WeeklyScore {
                    week: *week,
                    points: game.home_points,
                    opponent_points: game.away_points,
                    is_playoffs: game.is_playoffs,
                    is_consolation: game.is_consolation,
                });
                break;
            }
            if game.away_id.as_deref() == Some(team_id) {
                scores.push(WeeklyScore {
                    week: *week,
                    points: game.away_points,
                    opponent_points: game.home_points,
                    is_playoffs: game.is_playoffs,
                    is_consolation: game.is_consolation,
                });
                break;
            }
        }
    }
    scores
}

fn draft_slice_for(season: &SeasonData, team: &TeamRecord) -> Option<serde_json::Value> {
    let draft = season.draft.as_ref()?;
    let picks: Vec<_> = draft
        .picks
        .iter()
        .filter(|p| p.team_id == team.team_id)
        .collect();
    if picks.is_empty() {
        return None;
    }
    Some(serde_json::json!({
        "draft_type": draft.draft_type,
        "picks": picks,
    }))
}

fn transactions_for(season: &SeasonData, team: &TeamRecord) -> serde_json::Value {
    let own: Vec<_> = season
        .transactions
        .iter()
        .filter(|t| t.team_id == team.team_id)
        .collect();
    serde_json::to_value(own).unwrap_or(serde_json::Value::Array(Vec::new()))
}

/// Builds one canonical record per team in the season.
#[must_use]
pub fn canonical_records(season: &SeasonData) -> Vec<CanonicalRecord> {
    season
        .teams
        .iter()
        .map(|team| CanonicalRecord {
            season_year: season.season_year,
            team_name: team.team_name.clone(),
            owner_name: team.owner_name.clone(),
            owner_user_id: None,
            final_standing: team.final_standing,
            wins: team.wins,
            losses: team.losses,
            ties: team.ties,
            points_for: team.points_for,
            points_against: team.points_against,
            playoff_result: season.playoff_results.get(&team.team_id).copied(),
            draft_data: draft_slice_for(season, team),
            roster_data: team.roster.clone(),
            weekly_scores: weekly_scores_for(&team.team_id, &season.matchups),
            transactions: transactions_for(season, team),
            settings: season.settings.clone(),
        })
        .collect()
}
