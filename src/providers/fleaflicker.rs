//! Fleaflicker adapter.
//!
//! Fleaflicker keeps one league id valid across seasons, so discovery scans a
//! fixed year range newest-first: leading misses (a league with no current
//! season yet) are skipped, but once any season has been found the next miss
//! means the scan has walked past the league's first year and stops. An auth
//! failure aborts immediately. Playoff results come from final standings
//! ranks, with playoff appearances read off the scoreboard flags.

use crate::constants::scan;
use crate::models::season::{
    DraftData, DraftPick, MatchupGame, PlayoffOutcome, SeasonData, TeamRecord, TransactionRecord,
};
use crate::normalize::playoffs::{RankedTeam, derive_rank_only};
use crate::providers::{Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef};
use crate::services::archive::ArchiveWriter;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

const FLEAFLICKER_API: &str = "https://www.fleaflicker.com/api";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleaLeagueMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaStandingsPayload {
    #[serde(default)]
    league: Option<FleaLeagueMeta>,
    #[serde(default)]
    divisions: Vec<FleaDivision>,
}

#[derive(Debug, Deserialize)]
struct FleaDivision {
    #[serde(default)]
    teams: Vec<FleaTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaTeam {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    owners: Vec<FleaOwner>,
    record_overall: Option<FleaRecord>,
    points_for: Option<FleaFormattedValue>,
    points_against: Option<FleaFormattedValue>,
    league_standing: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaOwner {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct FleaRecord {
    #[serde(default)]
    wins: i32,
    #[serde(default)]
    losses: i32,
    #[serde(default)]
    ties: i32,
    rank: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct FleaFormattedValue {
    #[serde(default)]
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaScoreboardPayload {
    #[serde(default)]
    games: Vec<FleaGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaGame {
    home: Option<FleaGameSide>,
    away: Option<FleaGameSide>,
    home_score: Option<FleaGameScore>,
    away_score: Option<FleaGameScore>,
    #[serde(default)]
    is_playoffs: bool,
    #[serde(default)]
    is_consolation: bool,
}

#[derive(Debug, Deserialize)]
struct FleaGameSide {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct FleaGameScore {
    score: Option<FleaFormattedValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaDraftBoardPayload {
    #[serde(default)]
    ordered_selections: Vec<FleaDraftSelection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaDraftSelection {
    slot: Option<FleaDraftSlot>,
    team: Option<FleaGameSide>,
    player: Option<FleaPlayerWrapper>,
}

#[derive(Debug, Default, Deserialize)]
struct FleaDraftSlot {
    #[serde(default)]
    round: i32,
    #[serde(default)]
    slot: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaPlayerWrapper {
    pro_player: Option<FleaProPlayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaProPlayer {
    #[serde(default)]
    name_full: String,
    position: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaTransactionsPayload {
    #[serde(default)]
    items: Vec<FleaTransactionItem>,
}

#[derive(Debug, Deserialize)]
struct FleaTransactionItem {
    transaction: Option<FleaTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleaTransaction {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    team: Option<FleaGameSide>,
    #[serde(default)]
    players: Vec<FleaPlayerWrapper>,
}

/// Per-year probe, separated from HTTP so the range scan is testable.
#[async_trait::async_trait]
pub trait SeasonProbe: Send + Sync {
    async fn probe(&self, year: i32) -> Result<Option<FleaLeagueMeta>, ProviderError>;
}

/// Scans `[first, last]` newest-first. Misses before the first hit are
/// skipped; the first miss after a hit means the league's history has been
/// exhausted and ends the scan. Returns hits in ascending year order.
pub async fn scan_fixed_range(
    probe: &dyn SeasonProbe,
    first: i32,
    last: i32,
) -> Result<Vec<(i32, FleaLeagueMeta)>, ProviderError> {
    let mut found = Vec::new();
    for year in (first..=last).rev() {
        match probe.probe(year).await {
            Ok(Some(meta)) => found.push((year, meta)),
            Ok(None) if found.is_empty() => {}
            Ok(None) => break,
            Err(e @ ProviderError::Auth(_)) => return Err(e),
            Err(e) => {
                debug!(year, "probe degraded to skip: {e}");
            }
        }
    }
    found.reverse();
    Ok(found)
}

pub struct FleaflickerAdapter {
    client: Client,
    archive: Option<ArchiveWriter>,
}

impl FleaflickerAdapter {
    #[must_use]
    pub fn new(archive: Option<ArchiveWriter>) -> Self {
        Self {
            client: Client::new(),
            archive,
        }
    }

    fn archive_raw(&self, data_type: &str, event_ref: &str, payload: &serde_json::Value) {
        if let Some(writer) = &self.archive {
            writer.record("fleaflicker", data_type, event_ref, payload, 1);
        }
    }

    async fn get_json(
        &self,
        endpoint: &str,
        query: &str,
        credentials: &Credentials,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut url = format!("{FLEAFLICKER_API}/{endpoint}?sport=NFL&{query}");
        if let Credentials::ApiKey(key) = credentials {
            url.push_str("&api_key=");
            url.push_str(key);
        }
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(
                status,
                &format!("fleaflicker {endpoint}"),
            ));
        }
        Ok(response.json().await?)
    }

    async fn fetch_standings(
        &self,
        league_id: &str,
        year: i32,
        credentials: &Credentials,
    ) -> Result<FleaStandingsPayload, ProviderError> {
        let raw = self
            .get_json(
                "FetchLeagueStandings",
                &format!("league_id={league_id}&season={year}"),
                credentials,
            )
            .await?;
        self.archive_raw("standings", &format!("{league_id}/{year}"), &raw);
        serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))
    }

    async fn fetch_week(
        &self,
        league_id: &str,
        year: i32,
        week: i32,
        credentials: &Credentials,
    ) -> Result<Vec<MatchupGame>, ProviderError> {
        let raw = self
            .get_json(
                "FetchLeagueScoreboard",
                &format!("league_id={league_id}&season={year}&scoring_period={week}"),
                credentials,
            )
            .await?;
        self.archive_raw("scoreboard", &format!("{league_id}/{year}/{week}"), &raw);
        let payload: FleaScoreboardPayload =
            serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))?;

        let mut games = Vec::new();
        for game in payload.games {
            let Some(home) = &game.home else { continue };
            games.push(MatchupGame {
                week,
                home_id: home.id.to_string(),
                home_points: score_of(game.home_score.as_ref()),
                away_id: game.away.as_ref().map(|a| a.id.to_string()),
                away_points: score_of(game.away_score.as_ref()),
                is_playoffs: game.is_playoffs,
                is_consolation: game.is_consolation,
            });
        }
        Ok(games)
    }

    async fn fetch_draft(
        &self,
        league_id: &str,
        year: i32,
        credentials: &Credentials,
    ) -> Option<DraftData> {
        let raw = match self
            .get_json(
                "FetchLeagueDraftBoard",
                &format!("league_id={league_id}&season={year}"),
                credentials,
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                debug!(year, "draft board degraded to empty: {e}");
                return None;
            }
        };
        self.archive_raw("draft", &format!("{league_id}/{year}"), &raw);
        let payload: FleaDraftBoardPayload = serde_json::from_value(raw).ok()?;
        if payload.ordered_selections.is_empty() {
            return None;
        }

        let picks = payload
            .ordered_selections
            .into_iter()
            .filter_map(|selection| {
                let team = selection.team?;
                let slot = selection.slot.unwrap_or_default();
                let player = selection.player.and_then(|p| p.pro_player);
                Some(DraftPick {
                    round: slot.round,
                    pick: slot.slot,
                    team_id: team.id.to_string(),
                    player_name: player
                        .as_ref()
                        .map_or_else(String::new, |p| p.name_full.clone()),
                    position: player.and_then(|p| p.position),
                })
            })
            .collect();
        Some(DraftData {
            draft_type: None,
            picks,
        })
    }

    async fn fetch_transactions(
        &self,
        league_id: &str,
        year: i32,
        credentials: &Credentials,
    ) -> Vec<TransactionRecord> {
        let raw = match self
            .get_json(
                "FetchLeagueTransactions",
                &format!("league_id={league_id}&season={year}"),
                credentials,
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                debug!(year, "transactions degraded to empty: {e}");
                return Vec::new();
            }
        };
        self.archive_raw("transactions", &format!("{league_id}/{year}"), &raw);
        match serde_json::from_value::<FleaTransactionsPayload>(raw) {
            Ok(payload) => decode_transactions(payload),
            Err(_) => Vec::new(),
        }
    }
}

fn decode_transactions(payload: FleaTransactionsPayload) -> Vec<TransactionRecord> {
    payload
        .items
        .into_iter()
        .filter_map(|item| {
            let transaction = item.transaction?;
            let team = transaction.team?;
            let players: Vec<String> = transaction
                .players
                .iter()
                .filter_map(|p| p.pro_player.as_ref())
                .map(|p| p.name_full.clone())
                .collect();
            Some(TransactionRecord {
                week: None,
                kind: transaction
                    .kind
                    .unwrap_or_else(|| "UNKNOWN".to_string())
                    .to_lowercase(),
                team_id: team.id.to_string(),
                detail: serde_json::json!({ "players": players }),
            })
        })
        .collect()
}

/// Week-by-week scoreboard source, separated from HTTP so the walk is
/// testable.
#[async_trait::async_trait]
trait WeekSource: Send + Sync {
    async fn week(&self, week: i32) -> Result<Vec<MatchupGame>, ProviderError>;
}

struct HttpWeekSource<'a> {
    adapter: &'a FleaflickerAdapter,
    league_id: &'a str,
    year: i32,
    credentials: &'a Credentials,
}

#[async_trait::async_trait]
impl WeekSource for HttpWeekSource<'_> {
    async fn week(&self, week: i32) -> Result<Vec<MatchupGame>, ProviderError> {
        self.adapter
            .fetch_week(self.league_id, self.year, week, self.credentials)
            .await
    }
}

/// Walks weeks upward until the first empty scoreboard. A week that fails to
/// fetch ends the walk with the weeks collected so far; matchups degrade
/// instead of failing the season.
async fn walk_weeks(
    source: &impl WeekSource,
    max_week: i32,
) -> BTreeMap<i32, Vec<MatchupGame>> {
    let mut matchups = BTreeMap::new();
    for week in 1..=max_week {
        match source.week(week).await {
            Ok(games) if games.is_empty() => break,
            Ok(games) => {
                matchups.insert(week, games);
            }
            Err(e) => {
                debug!(week, "scoreboard fetch degraded: {e}");
                break;
            }
        }
    }
    matchups
}

fn playoff_results_from_standings(
    teams: &[TeamRecord],
    playoff_teams: &HashSet<String>,
) -> HashMap<String, PlayoffOutcome> {
    let ranked: Vec<RankedTeam> = teams
        .iter()
        .filter_map(|t| {
            t.final_standing.map(|rank| RankedTeam {
                team_id: t.team_id.clone(),
                rank: Some(rank),
                seeded: playoff_teams.contains(&t.team_id),
            })
        })
        .collect();
    derive_rank_only(&ranked)
}

fn score_of(score: Option<&FleaGameScore>) -> f64 {
    score
        .and_then(|s| s.score.as_ref())
        .map_or(0.0, |v| v.value)
}

struct HttpSeasonProbe<'a> {
    adapter: &'a FleaflickerAdapter,
    league_id: &'a str,
    credentials: &'a Credentials,
}

#[async_trait::async_trait]
impl SeasonProbe for HttpSeasonProbe<'_> {
    async fn probe(&self, year: i32) -> Result<Option<FleaLeagueMeta>, ProviderError> {
        match self
            .adapter
            .fetch_standings(self.league_id, year, self.credentials)
            .await
        {
            Ok(payload) if payload.divisions.iter().all(|d| d.teams.is_empty()) => Ok(None),
            Ok(payload) => Ok(Some(payload.league.unwrap_or(FleaLeagueMeta {
                name: String::new(),
            }))),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for FleaflickerAdapter {
    fn name(&self) -> &'static str {
        "fleaflicker"
    }

    async fn discover(
        &self,
        league_ref: &str,
        credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        let probe = HttpSeasonProbe {
            adapter: self,
            league_id: league_ref,
            credentials,
        };
        let current_year = chrono::Utc::now().year();
        let found =
            scan_fixed_range(&probe, scan::FLEAFLICKER_FIRST_SEASON, current_year).await?;

        if found.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "fleaflicker league {league_ref} has no visible seasons"
            )));
        }

        let name = found
            .last()
            .map(|(_, meta)| meta.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Fleaflicker League {league_ref}"));

        Ok(Discovery {
            name,
            sport: "nfl".to_string(),
            seasons: found
                .into_iter()
                .map(|(year, _)| SeasonRef {
                    year,
                    league_key: league_ref.to_string(),
                })
                .collect(),
        })
    }

    async fn import_season(
        &self,
        season: &SeasonRef,
        credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError> {
        let standings = self
            .fetch_standings(&season.league_key, season.year, credentials)
            .await?;

        let mut data = SeasonData::new(season.year);
        for division in &standings.divisions {
            for team in &division.teams {
                let record = team.record_overall.as_ref();
                data.teams.push(TeamRecord {
                    team_id: team.id.to_string(),
                    team_name: if team.name.is_empty() {
                        format!("Team {}", team.id)
                    } else {
                        team.name.clone()
                    },
                    owner_name: team
                        .owners
                        .first()
                        .map_or_else(|| "Unknown".to_string(), |o| o.display_name.clone()),
                    wins: record.map_or(0, |r| r.wins),
                    losses: record.map_or(0, |r| r.losses),
                    ties: record.map_or(0, |r| r.ties),
                    points_for: team.points_for.as_ref().map_or(0.0, |v| v.value),
                    points_against: team.points_against.as_ref().map_or(0.0, |v| v.value),
                    final_standing: team
                        .league_standing
                        .or_else(|| record.and_then(|r| r.rank))
                        .filter(|r| *r > 0),
                    roster: None,
                });
            }
        }
        if data.teams.is_empty() {
            return Err(ProviderError::Fetch(format!(
                "fleaflicker season {} returned no teams",
                season.year
            )));
        }

        // Season length is unknown up front; walk weeks until the first
        // empty scoreboard.
        let weeks = HttpWeekSource {
            adapter: self,
            league_id: &season.league_key,
            year: season.year,
            credentials,
        };
        data.matchups = walk_weeks(&weeks, scan::MAX_WEEKS).await;

        let playoff_teams: HashSet<String> = data
            .matchups
            .values()
            .flatten()
            .filter(|g| g.is_playoffs && !g.is_consolation)
            .flat_map(|g| {
                std::iter::once(g.home_id.clone()).chain(g.away_id.clone())
            })
            .collect();
        data.playoff_results = playoff_results_from_standings(&data.teams, &playoff_teams);

        let (draft, transactions) = tokio::join!(
            self.fetch_draft(&season.league_key, season.year, credentials),
            self.fetch_transactions(&season.league_key, season.year, credentials),
        );
        data.draft = draft;
        data.transactions = transactions;

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedProbe {
        seasons: Vec<i32>,
        auth_fail_at: Option<i32>,
    }

    #[async_trait::async_trait]
    impl SeasonProbe for ScriptedProbe {
        async fn probe(&self, year: i32) -> Result<Option<FleaLeagueMeta>, ProviderError> {
            if self.auth_fail_at == Some(year) {
                return Err(ProviderError::Auth("bad api key".into()));
            }
            if self.seasons.contains(&year) {
                Ok(Some(FleaLeagueMeta {
                    name: "Flea Circus".into(),
                }))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn scan_stops_at_first_miss_after_a_hit() {
        // 2015 exists but is unreachable: the miss at 2017 ends the scan.
        let probe = ScriptedProbe {
            seasons: vec![2015, 2018, 2019, 2020],
            auth_fail_at: None,
        };
        let found = scan_fixed_range(&probe, 2005, 2022).await.unwrap();
        let years: Vec<i32> = found.iter().map(|(y, _)| *y).collect();
        assert_eq!(years, vec![2018, 2019, 2020]);
    }

    #[tokio::test]
    async fn scan_skips_leading_misses() {
        // No current-year season yet; misses before the first hit continue.
        let probe = ScriptedProbe {
            seasons: vec![2019, 2020, 2021],
            auth_fail_at: None,
        };
        let found = scan_fixed_range(&probe, 2005, 2024).await.unwrap();
        let years: Vec<i32> = found.iter().map(|(y, _)| *y).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
    }

    #[tokio::test]
    async fn scan_aborts_on_auth_failure() {
        let probe = ScriptedProbe {
            seasons: vec![2020, 2021],
            auth_fail_at: Some(2021),
        };
        assert!(matches!(
            scan_fixed_range(&probe, 2005, 2022).await,
            Err(ProviderError::Auth(_))
        ));
    }

    #[test]
    fn playoff_participation_marks_seeded_teams() {
        let mut data = SeasonData::new(2023);
        data.matchups.insert(
            15,
            vec![MatchupGame {
                week: 15,
                home_id: "1".into(),
                home_points: 101.0,
                away_id: Some("2".into()),
                away_points: 88.0,
                is_playoffs: true,
                is_consolation: false,
            }],
        );
        let playoff_teams: HashSet<String> = data
            .matchups
            .values()
            .flatten()
            .filter(|g| g.is_playoffs && !g.is_consolation)
            .flat_map(|g| std::iter::once(g.home_id.clone()).chain(g.away_id.clone()))
            .collect();
        assert!(playoff_teams.contains("1"));
        assert!(playoff_teams.contains("2"));
        assert!(!playoff_teams.contains("3"));
    }

    fn team(id: &str, final_standing: Option<i32>) -> TeamRecord {
        TeamRecord {
            team_id: id.to_string(),
            team_name: format!("Team {id}"),
            owner_name: format!("Owner {id}"),
            wins: 7,
            losses: 7,
            ties: 0,
            points_for: 1300.0,
            points_against: 1280.0,
            final_standing,
            roster: None,
        }
    }

    #[test]
    fn standings_ranks_drive_playoff_outcomes() {
        let teams = vec![
            team("1", Some(1)),
            team("2", Some(2)),
            team("3", Some(5)),
            team("4", None),
        ];
        let seeded: HashSet<String> = std::iter::once("3".to_string()).collect();

        let results = playoff_results_from_standings(&teams, &seeded);
        assert_eq!(results.get("1"), Some(&PlayoffOutcome::Champion));
        assert_eq!(results.get("2"), Some(&PlayoffOutcome::RunnerUp));
        assert_eq!(results.get("3"), Some(&PlayoffOutcome::Eliminated));
        // No rank recorded, no outcome derived.
        assert!(!results.contains_key("4"));
    }

    #[test]
    fn transactions_decode_to_structured_detail() {
        let payload: FleaTransactionsPayload = serde_json::from_value(serde_json::json!({
            "items": [
                {
                    "transaction": {
                        "type": "TRADE",
                        "team": {"id": 123},
                        "players": [
                            {"proPlayer": {"nameFull": "Justin Jefferson", "position": "WR"}}
                        ]
                    }
                },
                {"transaction": {"team": {"id": 4}, "players": []}},
                {"transaction": null}
            ]
        }))
        .unwrap();

        let records = decode_transactions(payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, "trade");
        assert_eq!(records[0].team_id, "123");
        assert_eq!(records[0].detail["players"][0], "Justin Jefferson");
        assert_eq!(records[1].kind, "unknown");
        assert!(records[1].detail["players"].as_array().is_some_and(Vec::is_empty));
    }

    struct ScriptedWeeks {
        playable: i32,
        fail_at: Option<i32>,
    }

    #[async_trait::async_trait]
    impl WeekSource for ScriptedWeeks {
        async fn week(&self, week: i32) -> Result<Vec<MatchupGame>, ProviderError> {
            if self.fail_at == Some(week) {
                return Err(ProviderError::Fetch("upstream 502".into()));
            }
            if week > self.playable {
                return Ok(Vec::new());
            }
            Ok(vec![MatchupGame {
                week,
                home_id: "1".into(),
                home_points: 100.0,
                away_id: Some("2".into()),
                away_points: 90.0,
                is_playoffs: false,
                is_consolation: false,
            }])
        }
    }

    #[tokio::test]
    async fn week_walk_stops_at_first_empty_week() {
        let source = ScriptedWeeks {
            playable: 14,
            fail_at: None,
        };
        let matchups = walk_weeks(&source, scan::MAX_WEEKS).await;
        assert_eq!(matchups.len(), 14);
        assert!(matchups.contains_key(&14));
    }

    #[tokio::test]
    async fn failed_week_keeps_the_weeks_already_collected() {
        let source = ScriptedWeeks {
            playable: 14,
            fail_at: Some(4),
        };
        let matchups = walk_weeks(&source, scan::MAX_WEEKS).await;
        assert_eq!(matchups.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
