//! ESPN adapter.
//!
//! ESPN reuses one numeric league id for every season, so discovery probes a
//! fixed year range against the per-season endpoint: a 404 for a year means
//! that season doesn't exist (skip and continue), while an auth failure
//! aborts the whole scan. Private leagues authenticate with the
//! espn_s2/SWID cookie pair. Playoff results come from the tier label each
//! schedule entry carries.

use crate::constants::scan;
use crate::models::season::{
    DraftData, DraftPick, MatchupGame, SeasonData, TeamRecord,
};
use crate::normalize::playoffs::{GameTier, TieredGame, derive_tiered};
use crate::providers::{Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef};
use crate::services::archive::ArchiveWriter;
use chrono::Datelike;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

const ESPN_API: &str = "https://lm-api-reads.fantasy.espn.com/apis/v3/games/ffl";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EspnLeagueMeta {
    pub season_id: i32,
    #[serde(default)]
    pub settings: EspnSettingsMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EspnSettingsMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnSeasonPayload {
    #[serde(default)]
    teams: Vec<EspnTeam>,
    #[serde(default)]
    members: Vec<EspnMember>,
    #[serde(default)]
    schedule: Vec<EspnScheduleEntry>,
    #[serde(default)]
    settings: serde_json::Value,
    draft_detail: Option<EspnDraftDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnTeam {
    id: i64,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owners: Vec<String>,
    rank_calculated_final: Option<i32>,
    record: Option<EspnRecord>,
}

#[derive(Debug, Deserialize)]
struct EspnRecord {
    overall: Option<EspnOverall>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnOverall {
    #[serde(default)]
    wins: i32,
    #[serde(default)]
    losses: i32,
    #[serde(default)]
    ties: i32,
    #[serde(default)]
    points_for: f64,
    #[serde(default)]
    points_against: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnMember {
    id: String,
    display_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnScheduleEntry {
    matchup_period_id: i32,
    playoff_tier_type: Option<String>,
    winner: Option<String>,
    home: Option<EspnMatchupSide>,
    away: Option<EspnMatchupSide>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnMatchupSide {
    team_id: i64,
    #[serde(default)]
    total_points: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnDraftDetail {
    #[serde(default)]
    picks: Vec<EspnDraftPick>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnDraftPick {
    round_id: i32,
    round_pick_number: i32,
    team_id: i64,
    player_id: Option<i64>,
}

/// Per-year probe, separated from HTTP so the range scan is testable.
#[async_trait::async_trait]
pub trait YearProbe: Send + Sync {
    async fn probe(&self, year: i32) -> Result<Option<EspnLeagueMeta>, ProviderError>;
}

/// Probes every year in `[first, last]` ascending. Missing years are skipped;
/// an auth failure aborts the scan entirely.
pub async fn probe_year_range(
    probe: &dyn YearProbe,
    first: i32,
    last: i32,
) -> Result<Vec<(i32, EspnLeagueMeta)>, ProviderError> {
    let mut found = Vec::new();
    for year in first..=last {
        match probe.probe(year).await {
            Ok(Some(meta)) => found.push((year, meta)),
            Ok(None) => {}
            Err(e @ ProviderError::Auth(_)) => return Err(e),
            Err(e) => {
                debug!(year, "probe degraded to skip: {e}");
            }
        }
    }
    Ok(found)
}

/// Joins the `teams` and `members` payload fragments into owner names.
///
/// ESPN splits a team's owner across two arrays: teams reference member GUIDs
/// and members carry the display name. This is the one seam that knows about
/// that split.
fn owner_name_for(team: &EspnTeam, members: &HashMap<&str, &EspnMember>) -> String {
    for guid in &team.owners {
        if let Some(member) = members.get(guid.as_str()) {
            if let Some(display) = &member.display_name {
                return display.clone();
            }
            let full = format!(
                "{} {}",
                member.first_name.as_deref().unwrap_or(""),
                member.last_name.as_deref().unwrap_or(""),
            );
            let full = full.trim();
            if !full.is_empty() {
                return full.to_string();
            }
        }
    }
    "Unknown".to_string()
}

fn team_display_name(team: &EspnTeam) -> String {
    if let Some(name) = &team.name
        && !name.trim().is_empty()
    {
        return name.clone();
    }
    let joined = format!(
        "{} {}",
        team.location.as_deref().unwrap_or(""),
        team.nickname.as_deref().unwrap_or(""),
    );
    let joined = joined.trim();
    if joined.is_empty() {
        format!("Team {}", team.id)
    } else {
        joined.to_string()
    }
}

fn tier_of(label: Option<&str>) -> GameTier {
    match label {
        Some("WINNERS_BRACKET") => GameTier::Winners,
        Some("LOSERS_CONSOLATION_LADDER" | "CONSOLATION") => GameTier::Consolation,
        _ => GameTier::None,
    }
}

pub struct EspnAdapter {
    client: Client,
    archive: Option<ArchiveWriter>,
}

impl EspnAdapter {
    #[must_use]
    pub fn new(archive: Option<ArchiveWriter>) -> Self {
        Self {
            client: Client::new(),
            archive,
        }
    }

    fn archive_raw(&self, data_type: &str, event_ref: &str, payload: &serde_json::Value) {
        if let Some(writer) = &self.archive {
            writer.record("espn", data_type, event_ref, payload, 1);
        }
    }

    fn cookie_header(credentials: &Credentials) -> Option<String> {
        match credentials {
            Credentials::Cookies { espn_s2, swid } => {
                Some(format!("espn_s2={espn_s2}; SWID={swid}"))
            }
            _ => None,
        }
    }

    async fn get_season(
        &self,
        league_id: &str,
        year: i32,
        views: &str,
        credentials: &Credentials,
    ) -> Result<reqwest::Response, ProviderError> {
        let url =
            format!("{ESPN_API}/seasons/{year}/segments/0/leagues/{league_id}?{views}");
        let mut request = self.client.get(&url);
        if let Some(cookie) = Self::cookie_header(credentials) {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        Ok(request.send().await?)
    }
}

struct HttpYearProbe<'a> {
    adapter: &'a EspnAdapter,
    league_id: &'a str,
    credentials: &'a Credentials,
}

#[async_trait::async_trait]
impl YearProbe for HttpYearProbe<'_> {
    async fn probe(&self, year: i32) -> Result<Option<EspnLeagueMeta>, ProviderError> {
        let response = self
            .adapter
            .get_season(self.league_id, year, "view=mSettings", self.credentials)
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::from_status(
                status,
                &format!("espn season {year}"),
            ));
        }
        let raw: serde_json::Value = response.json().await?;
        self.adapter
            .archive_raw("league", &format!("{}/{year}", self.league_id), &raw);
        let meta = serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))?;
        Ok(Some(meta))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for EspnAdapter {
    fn name(&self) -> &'static str {
        "espn"
    }

    async fn discover(
        &self,
        league_ref: &str,
        credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        let probe = HttpYearProbe {
            adapter: self,
            league_id: league_ref,
            credentials,
        };
        let current_year = chrono::Utc::now().year();
        let found = probe_year_range(&probe, scan::ESPN_FIRST_SEASON, current_year).await?;

        if found.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "espn league {league_ref} has no visible seasons"
            )));
        }

        let name = found
            .last()
            .map(|(_, meta)| meta.settings.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("ESPN League {league_ref}"));

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
        let views = "view=mTeam&view=mMatchup&view=mSettings&view=mDraftDetail";
        let response = self
            .get_season(&season.league_key, season.year, views, credentials)
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(
                status,
                &format!("espn season {}", season.year),
            ));
        }
        let raw: serde_json::Value = response.json().await?;
        self.archive_raw(
            "season",
            &format!("{}/{}", season.league_key, season.year),
            &raw,
        );

        let payload: EspnSeasonPayload =
            serde_json::from_value(raw).map_err(|e| ProviderError::Fetch(e.to_string()))?;

        if payload.teams.is_empty() {
            return Err(ProviderError::Fetch(format!(
                "espn season {} returned no teams",
                season.year
            )));
        }

        let members: HashMap<&str, &EspnMember> = payload
            .members
            .iter()
            .map(|m| (m.id.as_str(), m))
            .collect();

        let mut data = SeasonData::new(season.year);
        data.settings = payload.settings.clone();

        for team in &payload.teams {
            let overall = team
                .record
                .as_ref()
                .and_then(|r| r.overall.as_ref());
            data.teams.push(TeamRecord {
                team_id: team.id.to_string(),
                team_name: team_display_name(team),
                owner_name: owner_name_for(team, &members),
                wins: overall.map_or(0, |o| o.wins),
                losses: overall.map_or(0, |o| o.losses),
                ties: overall.map_or(0, |o| o.ties),
                points_for: overall.map_or(0.0, |o| o.points_for),
                points_against: overall.map_or(0.0, |o| o.points_against),
                final_standing: team.rank_calculated_final.filter(|r| *r > 0),
                roster: None,
            });
        }

        let mut tiered_games = Vec::new();
        for entry in &payload.schedule {
            let Some(home) = &entry.home else { continue };
            let tier = tier_of(entry.playoff_tier_type.as_deref());
            let is_consolation = tier == GameTier::Consolation;
            let is_playoffs = tier != GameTier::None;

            data.matchups
                .entry(entry.matchup_period_id)
                .or_default()
                .push(MatchupGame {
                    week: entry.matchup_period_id,
                    home_id: home.team_id.to_string(),
                    home_points: home.total_points,
                    away_id: entry.away.as_ref().map(|a| a.team_id.to_string()),
                    away_points: entry.away.as_ref().map_or(0.0, |a| a.total_points),
                    is_playoffs,
                    is_consolation,
                });

            let mut participants = vec![home.team_id.to_string()];
            if let Some(away) = &entry.away {
                participants.push(away.team_id.to_string());
            }
            let winner = match entry.winner.as_deref() {
                Some("HOME") => Some(home.team_id.to_string()),
                Some("AWAY") => entry.away.as_ref().map(|a| a.team_id.to_string()),
                _ => None,
            };
            tiered_games.push(TieredGame {
                week: entry.matchup_period_id,
                tier,
                winner,
                participants,
            });
        }

        let team_ids: Vec<String> = data.teams.iter().map(|t| t.team_id.clone()).collect();
        data.playoff_results = derive_tiered(&tiered_games, &team_ids);

        if let Some(detail) = payload.draft_detail
            && !detail.picks.is_empty()
        {
            data.draft = Some(DraftData {
                draft_type: None,
                picks: detail
                    .picks
                    .into_iter()
                    .map(|p| DraftPick {
                        round: p.round_id,
                        pick: p.round_pick_number,
                        team_id: p.team_id.to_string(),
                        player_name: p
                            .player_id
                            .map_or_else(String::new, |id| format!("Player {id}")),
                        position: None,
                    })
                    .collect(),
            });
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedProbe {
        /// Years that exist.
        seasons: Vec<i32>,
        /// Year at which the probe reports an auth failure.
        auth_fail_at: Option<i32>,
    }

    #[async_trait::async_trait]
    impl YearProbe for ScriptedProbe {
        async fn probe(&self, year: i32) -> Result<Option<EspnLeagueMeta>, ProviderError> {
            if self.auth_fail_at == Some(year) {
                return Err(ProviderError::Auth("expired espn_s2".into()));
            }
            if self.seasons.contains(&year) {
                Ok(Some(EspnLeagueMeta {
                    season_id: year,
                    settings: EspnSettingsMeta {
                        name: "The Gridiron".into(),
                    },
                }))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn probe_skips_missing_years_and_stays_ascending() {
        let probe = ScriptedProbe {
            seasons: vec![2019, 2020, 2021, 2022, 2023],
            auth_fail_at: None,
        };
        let found = probe_year_range(&probe, 2004, 2024).await.unwrap();
        let years: Vec<i32> = found.iter().map(|(y, _)| *y).collect();
        assert_eq!(years, vec![2019, 2020, 2021, 2022, 2023]);
    }

    #[tokio::test]
    async fn probe_aborts_scan_on_auth_failure() {
        let probe = ScriptedProbe {
            seasons: vec![2019, 2020],
            auth_fail_at: Some(2020),
        };
        assert!(matches!(
            probe_year_range(&probe, 2019, 2023).await,
            Err(ProviderError::Auth(_))
        ));
    }

    #[test]
    fn owner_names_come_from_the_member_fragment() {
        let member = EspnMember {
            id: "{ABC}".into(),
            display_name: Some("CommishDan".into()),
            first_name: Some("Dan".into()),
            last_name: Some("Ng".into()),
        };
        let team = EspnTeam {
            id: 4,
            location: Some("Flea".into()),
            nickname: Some("Flickers".into()),
            name: None,
            owners: vec!["{ABC}".into()],
            rank_calculated_final: Some(5),
            record: None,
        };
        let members: HashMap<&str, &EspnMember> = HashMap::from([("{ABC}", &member)]);

        assert_eq!(owner_name_for(&team, &members), "CommishDan");
        assert_eq!(team_display_name(&team), "Flea Flickers");
    }

    #[test]
    fn unmatched_owner_guid_degrades_to_unknown() {
        let team = EspnTeam {
            id: 9,
            location: None,
            nickname: None,
            name: None,
            owners: vec!["{GHOST}".into()],
            rank_calculated_final: None,
            record: None,
        };
        assert_eq!(owner_name_for(&team, &HashMap::new()), "Unknown");
        assert_eq!(team_display_name(&team), "Team 9");
    }

    #[test]
    fn tier_labels_map_to_bracket_membership() {
        assert_eq!(tier_of(Some("WINNERS_BRACKET")), GameTier::Winners);
        assert_eq!(
            tier_of(Some("LOSERS_CONSOLATION_LADDER")),
            GameTier::Consolation
        );
        assert_eq!(tier_of(Some("NONE")), GameTier::None);
        assert_eq!(tier_of(None), GameTier::None);
    }
}
