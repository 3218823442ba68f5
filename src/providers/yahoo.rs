//! Yahoo Fantasy adapter.
//!
//! Yahoo issues a fresh "game" (epoch) key every season, so one league's id
//! resolves under a different key each year. Discovery enumerates every game
//! key the credentials have ever had access to (falling back to a hard-coded
//! table when enumeration fails), anchors on the most recent epoch that
//! resolves the given id, then walks the league's renew/renewed pointer chain
//! in both directions. OAuth bearer auth with a refresh callback invoked at
//! most once per call.
//!
//! Yahoo's JSON wraps everything in arrays of single-key fragment objects;
//! [`flatten_fragments`] is the one seam that knows how to merge them.

use crate::constants::{scan, yahoo as yahoo_tables};
use crate::models::season::{
    DraftData, DraftPick, MatchupGame, SeasonData, TeamRecord, TransactionRecord,
};
use crate::normalize::playoffs::{RankedTeam, derive_rank_only};
use crate::providers::{Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef};
use crate::services::archive::ArchiveWriter;
use reqwest::Client;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const YAHOO_API: &str = "https://fantasysports.yahooapis.com/fantasy/v2";

/// Minimal league metadata needed to drive the renewal-chain walk.
#[derive(Debug, Clone)]
pub struct YahooLeagueMeta {
    pub league_key: String,
    pub name: String,
    pub season: i32,
    /// Previous season's league, formatted `gameid_leagueid`.
    pub renew: Option<String>,
    /// Next season's league, same format.
    pub renewed: Option<String>,
}

/// League lookup by key, separated from HTTP so the chain walk is testable.
#[async_trait::async_trait]
pub trait LeagueEpochSource: Send + Sync {
    /// Returns None when the key resolves to nothing (not an error during
    /// anchoring).
    async fn league_meta(&self, league_key: &str)
    -> Result<Option<YahooLeagueMeta>, ProviderError>;
}

/// Converts a `gameid_leagueid` renewal pointer into a league key.
fn renewal_to_key(pointer: &str) -> Option<String> {
    let (game, league) = pointer.split_once('_')?;
    if game.is_empty() || league.is_empty() {
        return None;
    }
    Some(format!("{game}.l.{league}"))
}

/// Anchors on the most recent epoch resolving `league_id`, then walks the
/// renewal chain outward in both directions. Epoch ids must be given newest
/// first. Output oldest first, deduplicated by resolved key.
pub async fn walk_renewal_chain(
    source: &dyn LeagueEpochSource,
    epoch_ids_newest_first: &[i32],
    league_id: &str,
) -> Result<(YahooLeagueMeta, Vec<SeasonRef>), ProviderError> {
    let mut anchor = None;
    for game_id in epoch_ids_newest_first {
        let key = format!("{game_id}.l.{league_id}");
        if let Some(meta) = source.league_meta(&key).await? {
            anchor = Some(meta);
            break;
        }
    }
    let anchor = anchor.ok_or_else(|| {
        ProviderError::NotFound(format!("yahoo league {league_id} not visible in any game epoch"))
    })?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut found: Vec<YahooLeagueMeta> = Vec::new();

    // Backwards through renew, then forwards through renewed.
    for forward in [false, true] {
        let mut cursor = Some(anchor.clone());
        let mut hops = 0;
        while let Some(meta) = cursor {
            if !visited.insert(meta.league_key.clone()) && hops > 0 {
                warn!(key = %meta.league_key, "cyclic renewal chain; stopping walk");
                break;
            }
            if hops == 0 && forward {
                // Anchor was already recorded on the backward pass.
            } else {
                found.push(meta.clone());
            }

            hops += 1;
            if hops > scan::MAX_CHAIN_HOPS {
                break;
            }

            let pointer = if forward { &meta.renewed } else { &meta.renew };
            cursor = match pointer.as_deref().and_then(renewal_to_key) {
                Some(next_key) if !visited.contains(&next_key) => {
                    source.league_meta(&next_key).await?
                }
                _ => None,
            };
        }
    }

    found.sort_by_key(|m| m.season);
    found.dedup_by(|a, b| a.league_key == b.league_key);

    let seasons = found
        .into_iter()
        .map(|m| SeasonRef {
            year: m.season,
            league_key: m.league_key,
        })
        .collect();
    Ok((anchor, seasons))
}

/// Merges Yahoo's arrays of partial single-key objects into one flat map.
///
/// A league/team resource arrives as `[[{"a":1},{"b":2},[]], {"c":3}]`-style
/// nesting; every object key found anywhere in the tree wins last-write.
#[must_use]
pub fn flatten_fragments(value: &Value) -> HashMap<String, Value> {
    let mut merged = HashMap::new();
    collect_fragments(value, &mut merged);
    merged
}

fn collect_fragments(value: &Value, into: &mut HashMap<String, Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_fragments(item, into);
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                into.insert(key.clone(), val.clone());
            }
        }
        _ => {}
    }
}

fn flat_str(map: &HashMap<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flat_i32(map: &HashMap<String, Value>, key: &str) -> Option<i32> {
    map.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_i64().map(|n| n as i32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

fn flat_f64(map: &HashMap<String, Value>, key: &str) -> f64 {
    map.get(key)
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .unwrap_or(0.0)
}

fn meta_from_flat(map: &HashMap<String, Value>) -> Option<YahooLeagueMeta> {
    Some(YahooLeagueMeta {
        league_key: flat_str(map, "league_key")?,
        name: flat_str(map, "name").unwrap_or_default(),
        season: flat_i32(map, "season")?,
        renew: flat_str(map, "renew"),
        renewed: flat_str(map, "renewed"),
    })
}

/// Walks a Yahoo collection object (`{"0": {...}, "1": {...}, "count": n}`)
/// in index order.
fn collection_items(value: &Value) -> Vec<&Value> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };
    let mut indexed: Vec<(usize, &Value)> = map
        .iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, v)| v).collect()
}

pub struct YahooAdapter {
    client: Client,
    archive: Option<ArchiveWriter>,
    /// Token obtained from the refresh callback, preferred over the original
    /// credential token once present.
    refreshed_token: RwLock<Option<String>>,
}

impl YahooAdapter {
    #[must_use]
    pub fn new(archive: Option<ArchiveWriter>) -> Self {
        Self {
            client: Client::new(),
            archive,
            refreshed_token: RwLock::new(None),
        }
    }

    fn archive_raw(&self, data_type: &str, event_ref: &str, payload: &Value) {
        if let Some(writer) = &self.archive {
            writer.record("yahoo", data_type, event_ref, payload, 1);
        }
    }

    async fn bearer_token(&self, credentials: &Credentials) -> Result<String, ProviderError> {
        if let Some(token) = self.refreshed_token.read().await.clone() {
            return Ok(token);
        }
        match credentials {
            Credentials::OAuth { access_token, .. } => Ok(access_token.clone()),
            _ => Err(ProviderError::Auth(
                "yahoo requires an OAuth access token".to_string(),
            )),
        }
    }

    /// Authenticated GET with the refresh-once-retry-once policy: on an auth
    /// failure the refresh callback (if any) runs a single time and the call
    /// is retried once; a second failure is fatal to this call only.
    async fn get_json(
        &self,
        path: &str,
        credentials: &Credentials,
    ) -> Result<Value, ProviderError> {
        let url = format!("{YAHOO_API}/{path}?format=json");
        let token = self.bearer_token(credentials).await?;
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::UNAUTHORIZED {
            if !status.is_success() {
                return Err(ProviderError::from_status(status, path));
            }
            return Ok(response.json().await?);
        }

        let refresher = match credentials {
            Credentials::OAuth {
                refresher: Some(r), ..
            } => r,
            _ => return Err(ProviderError::Auth(format!("yahoo rejected token: {path}"))),
        };

        debug!(path, "yahoo token rejected; invoking refresh callback");
        let fresh = refresher.refresh().await?;
        *self.refreshed_token.write().await = Some(fresh.clone());

        let retry = self.client.get(&url).bearer_auth(&fresh).send().await?;
        let status = retry.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status, path));
        }
        Ok(retry.json().await?)
    }

    /// Enumerates every game (epoch) id the credentials have had access to,
    /// newest first, falling back to the static table on any failure.
    async fn epoch_ids(&self, credentials: &Credentials) -> Vec<i32> {
        let enumerated = self
            .get_json("users;use_login=1/games;game_codes=nfl", credentials)
            .await;
        let mut ids: Vec<i32> = match enumerated {
            Ok(raw) => {
                self.archive_raw("games", "login", &raw);
                let mut out = Vec::new();
                if let Some(users) = raw.pointer("/fantasy_content/users") {
                    for user in collection_items(users) {
                        if let Some(games) = user.pointer("/user/1/games") {
                            for game in collection_items(games) {
                                let flat = flatten_fragments(
                                    game.get("game").unwrap_or(&Value::Null),
                                );
                                if let Some(id) = flat_i32(&flat, "game_id") {
                                    out.push(id);
                                }
                            }
                        }
                    }
                }
                out
            }
            Err(e) => {
                debug!("yahoo game enumeration failed, using static table: {e}");
                Vec::new()
            }
        };

        if ids.is_empty() {
            ids = yahoo_tables::NFL_GAME_IDS.iter().map(|(_, id)| *id).collect();
        }
        ids.sort_unstable();
        ids.dedup();
        ids.reverse();
        ids
    }

    fn decode_team(flat: &HashMap<String, Value>) -> Option<(TeamRecord, RankedTeam)> {
        let team_id = flat_str(flat, "team_id")?;
        let standings = flat.get("team_standings").map(flatten_fragments);
        let outcome = standings
            .as_ref()
            .and_then(|s| s.get("outcome_totals"))
            .map(flatten_fragments)
            .unwrap_or_default();
        let rank = standings.as_ref().and_then(|s| flat_i32(s, "rank"));
        let seeded = standings
            .as_ref()
            .and_then(|s| flat_str(s, "playoff_seed"))
            .is_some_and(|seed| seed != "0");

        let manager_name = flat
            .get("managers")
            .map(flatten_fragments)
            .and_then(|m| m.get("manager").map(flatten_fragments))
            .and_then(|m| flat_str(&m, "nickname"))
            .unwrap_or_else(|| "Unknown".to_string());

        let record = TeamRecord {
            team_id: team_id.clone(),
            team_name: flat_str(flat, "name").unwrap_or_else(|| format!("Team {team_id}")),
            owner_name: manager_name,
            wins: flat_i32(&outcome, "wins").unwrap_or(0),
            losses: flat_i32(&outcome, "losses").unwrap_or(0),
            ties: flat_i32(&outcome, "ties").unwrap_or(0),
            points_for: standings.as_ref().map_or(0.0, |s| flat_f64(s, "points_for")),
            points_against: standings
                .as_ref()
                .map_or(0.0, |s| flat_f64(s, "points_against")),
            final_standing: rank,
            roster: None,
        };
        let ranked = RankedTeam {
            team_id,
            rank,
            seeded,
        };
        Some((record, ranked))
    }

    async fn fetch_week(
        &self,
        league_key: &str,
        week: i32,
        credentials: &Credentials,
    ) -> Result<Vec<MatchupGame>, ProviderError> {
        let path = format!("league/{league_key}/scoreboard;week={week}");
        let raw = self.get_json(&path, credentials).await?;
        self.archive_raw("scoreboard", &format!("{league_key}/{week}"), &raw);

        let Some(matchups) = raw
            .pointer("/fantasy_content/league/1/scoreboard/0/matchups")
        else {
            return Ok(Vec::new());
        };

        let mut games = Vec::new();
        for matchup in collection_items(matchups) {
            let flat = flatten_fragments(matchup.get("matchup").unwrap_or(&Value::Null));
            let is_playoffs = flat_str(&flat, "is_playoffs").is_some_and(|v| v == "1");
            let is_consolation = flat_str(&flat, "is_consolation").is_some_and(|v| v == "1");

            let Some(teams) = flat.get("teams") else { continue };
            let sides: Vec<(String, f64)> = collection_items(teams)
                .into_iter()
                .filter_map(|t| {
                    let team_flat = flatten_fragments(t.get("team").unwrap_or(&Value::Null));
                    let id = flat_str(&team_flat, "team_id")?;
                    let points = team_flat
                        .get("team_points")
                        .map(flatten_fragments)
                        .map_or(0.0, |p| flat_f64(&p, "total"));
                    Some((id, points))
                })
                .collect();

            if let Some((home_id, home_points)) = sides.first().cloned() {
                games.push(MatchupGame {
                    week,
                    home_id,
                    home_points,
                    away_id: sides.get(1).map(|(id, _)| id.clone()),
                    away_points: sides.get(1).map_or(0.0, |(_, p)| *p),
                    is_playoffs,
                    is_consolation,
                });
            }
        }
        Ok(games)
    }

    async fn fetch_draft(
        &self,
        league_key: &str,
        credentials: &Credentials,
    ) -> Result<Option<DraftData>, ProviderError> {
        let path = format!("league/{league_key}/draftresults");
        let raw = self.get_json(&path, credentials).await?;
        self.archive_raw("draftresults", league_key, &raw);

        let Some(results) = raw.pointer("/fantasy_content/league/1/draft_results") else {
            return Ok(None);
        };
        let picks: Vec<DraftPick> = collection_items(results)
            .into_iter()
            .filter_map(|r| {
                let flat = flatten_fragments(r.get("draft_result").unwrap_or(&Value::Null));
                Some(DraftPick {
                    round: flat_i32(&flat, "round")?,
                    pick: flat_i32(&flat, "pick")?,
                    team_id: flat_str(&flat, "team_key")?,
                    player_name: flat_str(&flat, "player_key").unwrap_or_default(),
                    position: None,
                })
            })
            .collect();

        if picks.is_empty() {
            Ok(None)
        } else {
            Ok(Some(DraftData {
                draft_type: None,
                picks,
            }))
        }
    }

    async fn fetch_transactions(
        &self,
        league_key: &str,
        credentials: &Credentials,
    ) -> Result<Vec<TransactionRecord>, ProviderError> {
        let path = format!("league/{league_key}/transactions");
        let raw = self.get_json(&path, credentials).await?;
        self.archive_raw("transactions", league_key, &raw);

        let Some(transactions) = raw.pointer("/fantasy_content/league/1/transactions") else {
            return Ok(Vec::new());
        };
        Ok(collection_items(transactions)
            .into_iter()
            .filter_map(|t| {
                let flat = flatten_fragments(t.get("transaction").unwrap_or(&Value::Null));
                Some(TransactionRecord {
                    week: None,
                    kind: flat_str(&flat, "type")?,
                    team_id: flat_str(&flat, "team_key").unwrap_or_default(),
                    detail: t.clone(),
                })
            })
            .collect())
    }
}

struct HttpEpochSource<'a> {
    adapter: &'a YahooAdapter,
    credentials: &'a Credentials,
}

#[async_trait::async_trait]
impl LeagueEpochSource for HttpEpochSource<'_> {
    async fn league_meta(
        &self,
        league_key: &str,
    ) -> Result<Option<YahooLeagueMeta>, ProviderError> {
        match self
            .adapter
            .get_json(&format!("league/{league_key}"), self.credentials)
            .await
        {
            Ok(raw) => {
                self.adapter.archive_raw("league", league_key, &raw);
                let flat = raw
                    .pointer("/fantasy_content/league")
                    .map(flatten_fragments)
                    .unwrap_or_default();
                Ok(meta_from_flat(&flat))
            }
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for YahooAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn discover(
        &self,
        league_ref: &str,
        credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        let epochs = self.epoch_ids(credentials).await;
        let source = HttpEpochSource {
            adapter: self,
            credentials,
        };
        let (anchor, seasons) = walk_renewal_chain(&source, &epochs, league_ref).await?;
        debug!(league = %anchor.name, count = seasons.len(), "yahoo discovery complete");
        Ok(Discovery {
            name: anchor.name,
            sport: "nfl".to_string(),
            seasons,
        })
    }

    async fn import_season(
        &self,
        season: &SeasonRef,
        credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError> {
        let league_key = &season.league_key;

        // Standings are the backbone; failure here fails the season.
        let raw = self
            .get_json(&format!("league/{league_key};out=settings,standings"), credentials)
            .await?;
        self.archive_raw("standings", league_key, &raw);

        let mut data = SeasonData::new(season.year);
        data.settings = raw
            .pointer("/fantasy_content/league/1/settings")
            .cloned()
            .unwrap_or(Value::Null);

        let teams_node = raw
            .pointer("/fantasy_content/league/1/standings/0/teams")
            .ok_or_else(|| {
                ProviderError::Fetch(format!("yahoo league {league_key} returned no standings"))
            })?;

        let mut ranked = Vec::new();
        for team_node in collection_items(teams_node) {
            let flat = flatten_fragments(team_node.get("team").unwrap_or(&Value::Null));
            if let Some((record, rank)) = Self::decode_team(&flat) {
                data.teams.push(record);
                ranked.push(rank);
            }
        }
        if data.teams.is_empty() {
            return Err(ProviderError::Fetch(format!(
                "yahoo league {league_key} decoded zero teams"
            )));
        }
        data.playoff_results = derive_rank_only(&ranked);

        // Week loop stops at the first empty scoreboard.
        let mut week = 1;
        while week <= scan::MAX_WEEKS {
            match self.fetch_week(league_key, week, credentials).await {
                Ok(games) if games.is_empty() => break,
                Ok(games) => {
                    data.matchups.insert(week, games);
                }
                Err(e) => {
                    debug!(week, "yahoo scoreboard degraded: {e}");
                    break;
                }
            }
            week += 1;
        }

        let (draft, transactions) = tokio::join!(
            self.fetch_draft(league_key, credentials),
            self.fetch_transactions(league_key, credentials),
        );
        match draft {
            Ok(d) => data.draft = d,
            Err(e) => debug!("yahoo draft degraded: {e}"),
        }
        match transactions {
            Ok(t) => data.transactions = t,
            Err(e) => debug!("yahoo transactions degraded: {e}"),
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MapSource(HashMap<String, YahooLeagueMeta>);

    #[async_trait::async_trait]
    impl LeagueEpochSource for MapSource {
        async fn league_meta(
            &self,
            league_key: &str,
        ) -> Result<Option<YahooLeagueMeta>, ProviderError> {
            Ok(self.0.get(league_key).cloned())
        }
    }

    fn meta(
        key: &str,
        season: i32,
        renew: Option<&str>,
        renewed: Option<&str>,
    ) -> YahooLeagueMeta {
        YahooLeagueMeta {
            league_key: key.to_string(),
            name: "Turkey Bowl".to_string(),
            season,
            renew: renew.map(ToString::to_string),
            renewed: renewed.map(ToString::to_string),
        }
    }

    fn source(metas: Vec<YahooLeagueMeta>) -> MapSource {
        MapSource(
            metas
                .into_iter()
                .map(|m| (m.league_key.clone(), m))
                .collect(),
        )
    }

    #[tokio::test]
    async fn anchors_on_most_recent_epoch_and_walks_both_directions() {
        // League 77 exists under epochs 399 (2020), 406 (2021), 414 (2022);
        // the importer's credentials only resolve it under 406 and older, so
        // the anchor is 406 and 414 is reached via the renewed pointer.
        let src = source(vec![
            meta("399.l.77", 2020, None, Some("406_77")),
            meta("406.l.77", 2021, Some("399_77"), Some("414_77")),
            meta("414.l.77", 2022, Some("406_77"), None),
        ]);

        let (anchor, seasons) = walk_renewal_chain(&src, &[449, 423, 406, 399], "77")
            .await
            .unwrap();
        assert_eq!(anchor.league_key, "406.l.77");
        let years: Vec<i32> = seasons.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![2020, 2021, 2022]);
    }

    #[tokio::test]
    async fn renewal_walk_survives_cycles() {
        let src = source(vec![
            meta("406.l.9", 2021, Some("414_9"), None),
            meta("414.l.9", 2022, Some("406_9"), None),
        ]);
        let (_, seasons) = walk_renewal_chain(&src, &[414, 406], "9").await.unwrap();
        assert_eq!(seasons.len(), 2);
    }

    #[tokio::test]
    async fn unresolvable_league_is_not_found() {
        let src = source(vec![]);
        assert!(matches!(
            walk_renewal_chain(&src, &[414, 406], "404").await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[test]
    fn fragment_arrays_merge_into_one_record() {
        let raw = json!([
            [
                {"league_key": "414.l.77"},
                {"name": "Turkey Bowl"},
                [],
                {"season": "2022"},
                {"renew": "406_77"}
            ],
            {"renewed": ""}
        ]);
        let flat = flatten_fragments(&raw);
        let meta = meta_from_flat(&flat).unwrap();

        assert_eq!(meta.league_key, "414.l.77");
        assert_eq!(meta.season, 2022);
        assert_eq!(meta.renew.as_deref(), Some("406_77"));
        // Empty string pointer means no renewal.
        assert_eq!(meta.renewed, None);
    }

    #[test]
    fn renewal_pointer_parses_to_league_key() {
        assert_eq!(renewal_to_key("406_77").as_deref(), Some("406.l.77"));
        assert_eq!(renewal_to_key(""), None);
        assert_eq!(renewal_to_key("406"), None);
    }

    #[test]
    fn collection_objects_iterate_in_index_order() {
        let coll = json!({"1": {"b": 2}, "0": {"a": 1}, "count": 2});
        let items = collection_items(&coll);
        assert_eq!(items.len(), 2);
        assert!(items[0].get("a").is_some());
    }

    #[test]
    fn team_decoding_handles_string_numbers() {
        let mut flat = HashMap::new();
        flat.insert("team_id".to_string(), json!("5"));
        flat.insert("name".to_string(), json!("Lamar's Legion"));
        flat.insert(
            "team_standings".to_string(),
            json!({
                "rank": "1",
                "playoff_seed": "2",
                "outcome_totals": {"wins": "11", "losses": "3", "ties": "0"},
                "points_for": "1650.42",
                "points_against": "1401.08"
            }),
        );

        let (record, ranked) = YahooAdapter::decode_team(&flat).unwrap();
        assert_eq!(record.wins, 11);
        assert_eq!(record.points_for, 1650.42);
        assert_eq!(ranked.rank, Some(1));
        assert!(ranked.seeded);
    }
}
