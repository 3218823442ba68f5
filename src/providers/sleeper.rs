//! Sleeper adapter.
//!
//! Sleeper keeps one league object per season and links them backwards via
//! `previous_league_id`, so discovery walks that chain from the given league.
//! The walk is hop-bounded with a visited set because nothing stops a
//! malformed chain from pointing at itself. No authentication required.

use crate::constants::scan;
use crate::models::season::{
    DraftData, DraftPick, MatchupGame, SeasonData, TeamRecord, TransactionRecord,
};
use crate::normalize::playoffs::{BracketMatch, derive_flagged_bracket};
use crate::normalize::{coerce_id, merge_split_points};
use crate::providers::{Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef};
use crate::services::archive::ArchiveWriter;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

const SLEEPER_API: &str = "https://api.sleeper.app/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct SleeperLeague {
    pub league_id: String,
    pub name: String,
    #[serde(default = "default_sport")]
    pub sport: String,
    pub season: String,
    pub previous_league_id: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
}

fn default_sport() -> String {
    "nfl".to_string()
}

#[derive(Debug, Deserialize)]
struct SleeperUser {
    user_id: String,
    display_name: String,
    #[serde(default)]
    metadata: Option<SleeperUserMeta>,
}

#[derive(Debug, Deserialize)]
struct SleeperUserMeta {
    team_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SleeperRoster {
    roster_id: i64,
    owner_id: Option<String>,
    #[serde(default)]
    settings: RosterSettings,
    #[serde(default)]
    players: Option<serde_json::Value>,
    #[serde(default)]
    starters: Option<serde_json::Value>,
}

/// Sleeper splits point totals into integer and hundredths fields.
#[derive(Debug, Default, Deserialize)]
struct RosterSettings {
    #[serde(default)]
    wins: i32,
    #[serde(default)]
    losses: i32,
    #[serde(default)]
    ties: i32,
    fpts: Option<i64>,
    fpts_decimal: Option<i64>,
    fpts_against: Option<i64>,
    fpts_against_decimal: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SleeperMatchup {
    roster_id: i64,
    matchup_id: Option<i64>,
    #[serde(default)]
    points: f64,
}

#[derive(Debug, Deserialize)]
struct SleeperBracketMatch {
    r: i32,
    m: i32,
    w: Option<serde_json::Value>,
    l: Option<serde_json::Value>,
    p: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SleeperDraft {
    draft_id: String,
    #[serde(rename = "type")]
    draft_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SleeperPick {
    round: i32,
    pick_no: i32,
    roster_id: Option<i64>,
    #[serde(default)]
    metadata: Option<PickMeta>,
}

#[derive(Debug, Deserialize)]
struct PickMeta {
    first_name: Option<String>,
    last_name: Option<String>,
    position: Option<String>,
}

/// Season-chain lookup, separated from HTTP so the walk is testable.
#[async_trait::async_trait]
pub trait LeagueChainSource: Send + Sync {
    async fn league(&self, league_id: &str) -> Result<SleeperLeague, ProviderError>;
}

/// Follows `previous_league_id` backwards from `start`, bounded and
/// cycle-safe, returning seasons oldest first.
pub async fn walk_chain(
    source: &dyn LeagueChainSource,
    start: &str,
) -> Result<(SleeperLeague, Vec<SeasonRef>), ProviderError> {
    let anchor = source.league(start).await?;

    let mut seasons = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut cursor = Some(anchor.clone());

    while let Some(league) = cursor {
        if !visited.insert(league.league_id.clone()) {
            warn!(league_id = %league.league_id, "cyclic previous_league_id chain; stopping walk");
            break;
        }
        if visited.len() > scan::MAX_CHAIN_HOPS {
            break;
        }

        let year = league.season.parse::<i32>().unwrap_or(0);
        seasons.push(SeasonRef {
            year,
            league_key: league.league_id.clone(),
        });

        cursor = match league.previous_league_id.as_deref() {
            Some(prev) if !prev.is_empty() && prev != "0" => match source.league(prev).await {
                Ok(prev_league) => Some(prev_league),
                Err(ProviderError::NotFound(_)) => None,
                Err(e) => return Err(e),
            },
            _ => None,
        };
    }

    seasons.reverse();
    Ok((anchor, seasons))
}

pub struct SleeperAdapter {
    client: Client,
    archive: Option<ArchiveWriter>,
}

impl SleeperAdapter {
    #[must_use]
    pub fn new(archive: Option<ArchiveWriter>) -> Self {
        Self {
            client: Client::new(),
            archive,
        }
    }

    fn archive_raw(&self, data_type: &str, event_ref: &str, payload: &serde_json::Value) {
        if let Some(writer) = &self.archive {
            let count = payload.as_array().map_or(1, Vec::len);
            writer.record("sleeper", data_type, event_ref, payload, count);
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{SLEEPER_API}/{path}");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status(), path));
        }
        Ok(response.json().await?)
    }

    /// Fetches one week of matchups, pairing entries by matchup id.
    async fn fetch_week(
        &self,
        league_id: &str,
        week: i32,
        playoff_week_start: i32,
    ) -> Result<Vec<MatchupGame>, ProviderError> {
        let path = format!("league/{league_id}/matchups/{week}");
        let raw = self.get_json(&path).await?;
        self.archive_raw("matchups", &format!("{league_id}/{week}"), &raw);

        let entries: Vec<SleeperMatchup> =
            serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))?;

        let mut by_matchup: BTreeMap<i64, Vec<&SleeperMatchup>> = BTreeMap::new();
        let mut byes = Vec::new();
        for entry in &entries {
            match entry.matchup_id {
                Some(id) => by_matchup.entry(id).or_default().push(entry),
                None => byes.push(entry),
            }
        }

        let is_playoffs = playoff_week_start > 0 && week >= playoff_week_start;
        let mut games = Vec::new();
        for pair in by_matchup.values() {
            let home = pair[0];
            let away = pair.get(1);
            games.push(MatchupGame {
                week,
                home_id: home.roster_id.to_string(),
                home_points: home.points,
                away_id: away.map(|a| a.roster_id.to_string()),
                away_points: away.map_or(0.0, |a| a.points),
                is_playoffs,
                is_consolation: false,
            });
        }
        for bye in byes {
            games.push(MatchupGame {
                week,
                home_id: bye.roster_id.to_string(),
                home_points: bye.points,
                away_id: None,
                away_points: 0.0,
                is_playoffs,
                is_consolation: false,
            });
        }
        Ok(games)
    }

    async fn fetch_draft(&self, league_id: &str) -> Result<Option<DraftData>, ProviderError> {
        let raw = self.get_json(&format!("league/{league_id}/drafts")).await?;
        self.archive_raw("drafts", league_id, &raw);
        let drafts: Vec<SleeperDraft> =
            serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))?;
        let Some(draft) = drafts.first() else {
            return Ok(None);
        };

        let raw_picks = self
            .get_json(&format!("draft/{}/picks", draft.draft_id))
            .await?;
        self.archive_raw("draft_picks", &draft.draft_id, &raw_picks);
        let picks: Vec<SleeperPick> =
            serde_json::from_value(raw_picks).map_err(|e| ProviderError::Fetch(e.to_string()))?;

        Ok(Some(DraftData {
            draft_type: draft.draft_type.clone(),
            picks: picks
                .into_iter()
                .map(|p| {
                    let meta = p.metadata.as_ref();
                    let name = format!(
                        "{} {}",
                        meta.and_then(|m| m.first_name.as_deref()).unwrap_or(""),
                        meta.and_then(|m| m.last_name.as_deref()).unwrap_or(""),
                    );
                    DraftPick {
                        round: p.round,
                        pick: p.pick_no,
                        team_id: p.roster_id.map_or_else(String::new, |id| id.to_string()),
                        player_name: name.trim().to_string(),
                        position: p.metadata.and_then(|m| m.position),
                    }
                })
                .collect(),
        }))
    }

    async fn fetch_transactions(
        &self,
        league_id: &str,
        weeks: i32,
    ) -> Result<Vec<TransactionRecord>, ProviderError> {
        let fetches = (1..=weeks.max(1)).map(|week| {
            let path = format!("league/{league_id}/transactions/{week}");
            async move { (week, self.get_json(&path).await) }
        });

        let mut records = Vec::new();
        for (week, result) in futures::future::join_all(fetches).await {
            let Ok(raw) = result else { continue };
            self.archive_raw("transactions", &format!("{league_id}/{week}"), &raw);
            let Some(items) = raw.as_array() else {
                continue;
            };
            for item in items {
                let kind = item
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let team_ids: Vec<String> = item
                    .get("roster_ids")
                    .and_then(|v| v.as_array())
                    .map(|ids| ids.iter().map(coerce_id).collect())
                    .unwrap_or_default();
                for team_id in team_ids {
                    records.push(TransactionRecord {
                        week: Some(week),
                        kind: kind.clone(),
                        team_id,
                        detail: item.clone(),
                    });
                }
            }
        }
        Ok(records)
    }

    fn bracket_matches(raw: &serde_json::Value) -> Vec<BracketMatch> {
        let Ok(matches) = serde_json::from_value::<Vec<SleeperBracketMatch>>(raw.clone()) else {
            return Vec::new();
        };
        matches
            .into_iter()
            .map(|m| BracketMatch {
                round: m.r,
                match_id: m.m,
                winner: m.w.as_ref().map(coerce_id),
                loser: m.l.as_ref().map(coerce_id),
                placement: m.p,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LeagueChainSource for SleeperAdapter {
    async fn league(&self, league_id: &str) -> Result<SleeperLeague, ProviderError> {
        let raw = self.get_json(&format!("league/{league_id}")).await?;
        self.archive_raw("league", league_id, &raw);
        serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for SleeperAdapter {
    fn name(&self) -> &'static str {
        "sleeper"
    }

    async fn discover(
        &self,
        league_ref: &str,
        _credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        let (anchor, seasons) = walk_chain(self, league_ref).await?;
        debug!(league = %anchor.name, count = seasons.len(), "sleeper discovery complete");
        Ok(Discovery {
            name: anchor.name,
            sport: anchor.sport,
            seasons,
        })
    }

    async fn import_season(
        &self,
        season: &SeasonRef,
        _credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError> {
        let league_id = &season.league_key;

        // Rosters and users are the season's backbone; either failing fails
        // the season.
        let league_raw = self.get_json(&format!("league/{league_id}")).await?;
        let rosters_path = format!("league/{league_id}/rosters");
        let users_path = format!("league/{league_id}/users");
        let (rosters_raw, users_raw) = tokio::try_join!(
            self.get_json(&rosters_path),
            self.get_json(&users_path),
        )?;
        self.archive_raw("rosters", league_id, &rosters_raw);
        self.archive_raw("users", league_id, &users_raw);

        let rosters: Vec<SleeperRoster> = serde_json::from_value(rosters_raw)
            .map_err(|e| ProviderError::Fetch(e.to_string()))?;
        let users: Vec<SleeperUser> =
            serde_json::from_value(users_raw).map_err(|e| ProviderError::Fetch(e.to_string()))?;

        let users_by_id: HashMap<&str, &SleeperUser> =
            users.iter().map(|u| (u.user_id.as_str(), u)).collect();

        let playoff_week_start = league_raw
            .pointer("/settings/playoff_week_start")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0) as i32;

        let mut data = SeasonData::new(season.year);
        data.settings = league_raw.get("settings").cloned().unwrap_or_default();

        for roster in &rosters {
            let user = roster
                .owner_id
                .as_deref()
                .and_then(|id| users_by_id.get(id));
            let owner_name = user.map_or_else(|| "Unknown".to_string(), |u| u.display_name.clone());
            let team_name = user
                .and_then(|u| u.metadata.as_ref())
                .and_then(|m| m.team_name.clone())
                .unwrap_or_else(|| format!("Team {owner_name}"));

            data.teams.push(TeamRecord {
                team_id: roster.roster_id.to_string(),
                team_name,
                owner_name,
                wins: roster.settings.wins,
                losses: roster.settings.losses,
                ties: roster.settings.ties,
                points_for: merge_split_points(
                    roster.settings.fpts,
                    roster.settings.fpts_decimal,
                ),
                points_against: merge_split_points(
                    roster.settings.fpts_against,
                    roster.settings.fpts_against_decimal,
                ),
                final_standing: None,
                roster: Some(serde_json::json!({
                    "players": roster.players,
                    "starters": roster.starters,
                })),
            });
        }

        // Season length is only known by hitting the first empty week.
        let mut week = 1;
        while week <= scan::MAX_WEEKS {
            match self.fetch_week(league_id, week, playoff_week_start).await {
                Ok(games) if games.is_empty() => break,
                Ok(games) => {
                    data.matchups.insert(week, games);
                }
                Err(e) => {
                    debug!(week, "sleeper matchup fetch degraded: {e}");
                    break;
                }
            }
            week += 1;
        }
        let played_weeks = week - 1;

        // Bracket, draft, and transactions degrade independently.
        let bracket_path = format!("league/{league_id}/winners_bracket");
        let (bracket, draft, transactions) = tokio::join!(
            self.get_json(&bracket_path),
            self.fetch_draft(league_id),
            self.fetch_transactions(league_id, played_weeks),
        );

        match bracket {
            Ok(raw) => {
                self.archive_raw("winners_bracket", league_id, &raw);
                let matches = Self::bracket_matches(&raw);
                let team_ids: Vec<String> =
                    data.teams.iter().map(|t| t.team_id.clone()).collect();
                data.playoff_results = derive_flagged_bracket(&matches, &team_ids);
            }
            Err(e) => debug!("sleeper bracket degraded: {e}"),
        }
        match draft {
            Ok(d) => data.draft = d,
            Err(e) => debug!("sleeper draft degraded: {e}"),
        }
        match transactions {
            Ok(t) => data.transactions = t,
            Err(e) => debug!("sleeper transactions degraded: {e}"),
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapSource(HashMap<String, SleeperLeague>);

    #[async_trait::async_trait]
    impl LeagueChainSource for MapSource {
        async fn league(&self, league_id: &str) -> Result<SleeperLeague, ProviderError> {
            self.0
                .get(league_id)
                .cloned()
                .ok_or_else(|| ProviderError::NotFound(league_id.to_string()))
        }
    }

    fn league(id: &str, season: &str, prev: Option<&str>) -> SleeperLeague {
        SleeperLeague {
            league_id: id.to_string(),
            name: "Dynasty Bros".to_string(),
            sport: "nfl".to_string(),
            season: season.to_string(),
            previous_league_id: prev.map(ToString::to_string),
            settings: serde_json::Value::Null,
        }
    }

    fn source(leagues: Vec<SleeperLeague>) -> MapSource {
        MapSource(
            leagues
                .into_iter()
                .map(|l| (l.league_id.clone(), l))
                .collect(),
        )
    }

    #[tokio::test]
    async fn chain_walk_returns_seasons_oldest_first() {
        let src = source(vec![
            league("c", "2023", Some("b")),
            league("b", "2022", Some("a")),
            league("a", "2021", None),
        ]);

        let (_, seasons) = walk_chain(&src, "c").await.unwrap();
        let years: Vec<i32> = seasons.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2021, 2022, 2023]);
        assert_eq!(seasons[0].league_key, "a");
    }

    #[tokio::test]
    async fn chain_walk_terminates_on_cycles() {
        let src = source(vec![
            league("x", "2023", Some("y")),
            league("y", "2022", Some("x")),
        ]);

        let (_, seasons) = walk_chain(&src, "x").await.unwrap();
        assert_eq!(seasons.len(), 2);
    }

    #[tokio::test]
    async fn chain_walk_stops_at_missing_predecessor() {
        let src = source(vec![league("b", "2022", Some("gone"))]);
        let (_, seasons) = walk_chain(&src, "b").await.unwrap();
        assert_eq!(seasons.len(), 1);
    }

    #[tokio::test]
    async fn chain_walk_surfaces_missing_anchor() {
        let src = source(vec![]);
        assert!(matches!(
            walk_chain(&src, "nope").await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn bracket_decoding_tolerates_numeric_ids() {
        let raw = serde_json::json!([
            {"r": 1, "m": 1, "w": 3, "l": 6, "p": null},
            {"r": 2, "m": 2, "w": 3, "l": 1, "p": 1},
            {"r": 2, "m": 3, "w": 6, "l": 2, "p": 3},
        ]);
        let matches = SleeperAdapter::bracket_matches(&raw);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[1].winner.as_deref(), Some("3"));
        assert_eq!(matches[1].placement, Some(1));
    }
}
