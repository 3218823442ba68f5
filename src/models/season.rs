//! Provider-neutral season model.
//!
//! Every adapter normalizes its native payloads into [`SeasonData`] before the
//! orchestrator sees them. Team ids are kept as strings throughout because
//! providers mix numeric and string ids, sometimes within one season.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One team's imported results for a single season, before canonical-league
/// assignment and owner resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: String,
    pub team_name: String,
    pub owner_name: String,
    pub wins: i32,
    pub losses: i32,
    pub ties: i32,
    pub points_for: f64,
    pub points_against: f64,
    pub final_standing: Option<i32>,
    /// Opaque provider roster blob, stored verbatim.
    pub roster: Option<serde_json::Value>,
}

/// One scheduled game: two scored sides for a given week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchupGame {
    pub week: i32,
    pub home_id: String,
    pub home_points: f64,
    /// None for bye weeks and median games.
    pub away_id: Option<String>,
    pub away_points: f64,
    pub is_playoffs: bool,
    pub is_consolation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPick {
    pub round: i32,
    pub pick: i32,
    pub team_id: String,
    pub player_name: String,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftData {
    pub draft_type: Option<String>,
    pub picks: Vec<DraftPick>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub week: Option<i32>,
    pub kind: String,
    pub team_id: String,
    pub detail: serde_json::Value,
}

/// Final postseason outcome for one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoffOutcome {
    Champion,
    RunnerUp,
    ThirdPlace,
    Playoffs,
    Eliminated,
    Missed,
}

impl PlayoffOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Champion => "champion",
            Self::RunnerUp => "runner_up",
            Self::ThirdPlace => "third_place",
            Self::Playoffs => "playoffs",
            Self::Eliminated => "eliminated",
            Self::Missed => "missed",
        }
    }
}

impl fmt::Display for PlayoffOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an adapter could recover for one season.
///
/// Standings are mandatory; every other slice degrades to empty/None when its
/// sub-fetch fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonData {
    pub season_year: i32,
    pub teams: Vec<TeamRecord>,
    /// Week number to the games played that week, ordered by week.
    pub matchups: BTreeMap<i32, Vec<MatchupGame>>,
    pub draft: Option<DraftData>,
    pub transactions: Vec<TransactionRecord>,
    /// Team id to final postseason outcome.
    pub playoff_results: std::collections::HashMap<String, PlayoffOutcome>,
    /// Verbatim provider settings snapshot.
    pub settings: serde_json::Value,
}

impl SeasonData {
    #[must_use]
    pub fn new(season_year: i32) -> Self {
        Self {
            season_year,
            teams: Vec::new(),
            matchups: BTreeMap::new(),
            draft: None,
            transactions: Vec::new(),
            playoff_results: std::collections::HashMap::new(),
            settings: serde_json::Value::Null,
        }
    }
}

/// One derived weekly score line for a stored team-season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyScore {
    pub week: i32,
    pub points: f64,
    pub opponent_points: f64,
    pub is_playoffs: bool,
    pub is_consolation: bool,
}
