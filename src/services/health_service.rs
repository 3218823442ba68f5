//! Domain service for import health analysis.
//!
//! This module provides the [`HealthService`] trait plus the report types it
//! returns. The analyzer is a read-only scorer over a league's stored
//! team-seasons; it never mutates anything and surfaces data-quality problems
//! the import pipeline deliberately tolerates (skipped teams, failed seasons,
//! un-merged owner aliases).

use crate::constants::health;
use crate::domain::LeagueId;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Domain errors for health analysis.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("League not found: {0}")]
    LeagueNotFound(LeagueId),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for HealthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    #[must_use]
    pub const fn penalty(self) -> i32 {
        match self {
            Self::High => health::PENALTY_HIGH,
            Self::Medium => health::PENALTY_MEDIUM,
            Self::Low => health::PENALTY_LOW,
            Self::Info => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    MissingSeason,
    GameCountAnomaly,
    ZeroPoints,
    PointsOutlier,
    TeamCountAnomaly,
    MultipleChampions,
    NoChampion,
    FutureSeason,
    PartialCurrentSeason,
    MissingWeeklyScores,
    AllZeroRecords,
    PossibleAlias,
    SparseOwnerData,
}

/// One detected data-quality problem. `season_year` is `None` for
/// cross-season issues.
#[derive(Debug, Clone, Serialize)]
pub struct HealthIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub season_year: Option<i32>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

impl HealthStatus {
    #[must_use]
    pub const fn from_score(score: i32) -> Self {
        if score >= health::STATUS_GREEN_MIN {
            Self::Green
        } else if score >= health::STATUS_YELLOW_MIN {
            Self::Yellow
        } else {
            Self::Red
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeasonHealth {
    pub score: i32,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall_score: i32,
    pub overall_status: HealthStatus,
    pub season_count: usize,
    /// `(min_year, max_year)` over stored seasons; `None` for empty leagues.
    pub year_range: Option<(i32, i32)>,
    pub missing_years: Vec<i32>,
    pub issues: Vec<HealthIssue>,
    pub per_season: BTreeMap<i32, SeasonHealth>,
}

/// Domain service trait for league health analysis.
#[async_trait::async_trait]
pub trait HealthService: Send + Sync {
    /// Scores one league's imported history.
    ///
    /// # Errors
    ///
    /// - Returns [`HealthError::LeagueNotFound`] if the league id is unknown
    async fn analyze_league(&self, league_id: LeagueId) -> Result<HealthReport, HealthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_thresholds() {
        assert_eq!(HealthStatus::from_score(100), HealthStatus::Green);
        assert_eq!(HealthStatus::from_score(80), HealthStatus::Green);
        assert_eq!(HealthStatus::from_score(79), HealthStatus::Yellow);
        assert_eq!(HealthStatus::from_score(50), HealthStatus::Yellow);
        assert_eq!(HealthStatus::from_score(49), HealthStatus::Red);
    }

    #[test]
    fn info_issues_cost_nothing() {
        assert_eq!(Severity::Info.penalty(), 0);
        assert_eq!(Severity::High.penalty(), 30);
    }
}
