//! Offline CSV adapter.
//!
//! For leagues whose platform is gone (or was never online), the user pastes
//! a season standings export as CSV text. There is no API: discovery parses
//! the export and always yields exactly one season, and import re-reads the
//! same rows into standings. Expected header:
//!
//! `season,team_name,owner_name,wins,losses,ties,points_for,points_against,final_standing`
//!
//! Every row must carry the same season year. Matchups, draft, and
//! transactions are not representable in the export and stay empty.

use crate::models::season::{SeasonData, TeamRecord};
use crate::normalize::playoffs::{RankedTeam, derive_rank_only};
use crate::providers::{Credentials, Discovery, ProviderAdapter, ProviderError, SeasonRef};
use crate::services::archive::ArchiveWriter;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExportRow {
    season: i32,
    team_name: String,
    owner_name: String,
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
    final_standing: Option<i32>,
}

fn parse_export(text: &str) -> Result<Vec<ExportRow>, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<ExportRow>().enumerate() {
        let row = record
            .map_err(|e| ProviderError::Fetch(format!("csv row {}: {e}", index + 2)))?;
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(ProviderError::Fetch(
            "csv export contains no data rows".to_string(),
        ));
    }
    let season = rows[0].season;
    if rows.iter().any(|r| r.season != season) {
        return Err(ProviderError::Fetch(
            "csv export mixes multiple seasons; upload one season at a time".to_string(),
        ));
    }
    Ok(rows)
}

fn export_text(credentials: &Credentials) -> Result<&str, ProviderError> {
    match credentials {
        Credentials::CsvText(text) => Ok(text),
        _ => Err(ProviderError::Auth(
            "csv adapter requires pasted export text".to_string(),
        )),
    }
}

pub struct CsvAdapter {
    archive: Option<ArchiveWriter>,
}

impl CsvAdapter {
    #[must_use]
    pub const fn new(archive: Option<ArchiveWriter>) -> Self {
        Self { archive }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for CsvAdapter {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn discover(
        &self,
        league_ref: &str,
        credentials: &Credentials,
    ) -> Result<Discovery, ProviderError> {
        let text = export_text(credentials)?;
        let rows = parse_export(text)?;
        let year = rows[0].season;

        if let Some(writer) = &self.archive {
            writer.record(
                "csv",
                "export",
                &format!("{league_ref}/{year}"),
                &serde_json::json!({ "csv": text }),
                rows.len(),
            );
        }

        Ok(Discovery {
            name: league_ref.to_string(),
            sport: "nfl".to_string(),
            seasons: vec![SeasonRef {
                year,
                league_key: league_ref.to_string(),
            }],
        })
    }

    async fn import_season(
        &self,
        season: &SeasonRef,
        credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError> {
        let rows = parse_export(export_text(credentials)?)?;
        if rows[0].season != season.year {
            return Err(ProviderError::NotFound(format!(
                "csv export holds season {}, not {}",
                rows[0].season, season.year
            )));
        }

        let mut data = SeasonData::new(season.year);
        for (index, row) in rows.iter().enumerate() {
            data.teams.push(TeamRecord {
                team_id: (index + 1).to_string(),
                team_name: row.team_name.clone(),
                owner_name: row.owner_name.clone(),
                wins: row.wins,
                losses: row.losses,
                ties: row.ties,
                points_for: row.points_for,
                points_against: row.points_against,
                final_standing: row.final_standing.filter(|r| *r > 0),
                roster: None,
            });
        }

        let ranked: Vec<RankedTeam> = data
            .teams
            .iter()
            .filter_map(|t| {
                t.final_standing.map(|rank| RankedTeam {
                    team_id: t.team_id.clone(),
                    rank: Some(rank),
                    seeded: false,
                })
            })
            .collect();
        data.playoff_results = derive_rank_only(&ranked);

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::season::PlayoffOutcome;

    const EXPORT: &str = "\
season,team_name,owner_name,wins,losses,ties,points_for,points_against,final_standing
2011,The Replacements,Mike Smith,10,3,0,1450.5,1301.2,1
2011,Bench Warmers,Sarah K,8,5,0,1388.0,1350.9,2
2011,Waiver Wire Heroes,Derek,4,9,0,1202.3,1404.6,3";

    #[tokio::test]
    async fn discovery_yields_exactly_one_season() {
        let adapter = CsvAdapter::new(None);
        let credentials = Credentials::CsvText(EXPORT.to_string());
        let discovery = adapter
            .discover("The Old League", &credentials)
            .await
            .unwrap();
        assert_eq!(discovery.name, "The Old League");
        assert_eq!(discovery.seasons.len(), 1);
        assert_eq!(discovery.seasons[0].year, 2011);
    }

    #[tokio::test]
    async fn import_builds_standings_and_rank_playoffs() {
        let adapter = CsvAdapter::new(None);
        let credentials = Credentials::CsvText(EXPORT.to_string());
        let season = SeasonRef {
            year: 2011,
            league_key: "The Old League".to_string(),
        };
        let data = adapter.import_season(&season, &credentials).await.unwrap();

        assert_eq!(data.teams.len(), 3);
        assert_eq!(data.teams[0].owner_name, "Mike Smith");
        assert_eq!(data.teams[0].wins, 10);
        assert!(data.matchups.is_empty());
        assert_eq!(data.playoff_results.get("1"), Some(&PlayoffOutcome::Champion));
        assert_eq!(data.playoff_results.get("2"), Some(&PlayoffOutcome::RunnerUp));
        assert_eq!(data.playoff_results.get("3"), Some(&PlayoffOutcome::Missed));
    }

    #[tokio::test]
    async fn mixed_seasons_are_rejected() {
        let text = "\
season,team_name,owner_name,wins,losses,ties,points_for,points_against,final_standing
2011,A,Al,1,0,0,100,90,1
2012,B,Bo,0,1,0,90,100,2";
        let adapter = CsvAdapter::new(None);
        let result = adapter
            .discover("x", &Credentials::CsvText(text.to_string()))
            .await;
        assert!(matches!(result, Err(ProviderError::Fetch(_))));
    }

    #[tokio::test]
    async fn wrong_credential_kind_is_an_auth_error() {
        let adapter = CsvAdapter::new(None);
        let result = adapter.discover("x", &Credentials::None).await;
        assert!(matches!(result, Err(ProviderError::Auth(_))));
    }

    #[test]
    fn empty_export_is_rejected() {
        let header_only =
            "season,team_name,owner_name,wins,losses,ties,points_for,points_against,final_standing";
        assert!(matches!(
            parse_export(header_only),
            Err(ProviderError::Fetch(_))
        ));
    }
}
