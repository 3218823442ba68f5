//! Provider adapters.
//!
//! One adapter per fantasy platform, each implementing the same two-phase
//! contract: `discover` enumerates every season the credentials can see, then
//! `import_season` fetches and normalizes one season at a time. The five
//! platforms differ in season-discovery topology, authentication lifecycle,
//! and payload shape; everything downstream of [`SeasonData`] is shared.

pub mod csv_upload;
pub mod espn;
pub mod fleaflicker;
pub mod sleeper;
pub mod yahoo;

use crate::models::season::SeasonData;
use crate::services::archive::ArchiveWriter;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by provider adapters.
///
/// `NotFound` doubles as a scan-termination signal during discovery and is
/// never shown to the user; `RateLimit` is surfaced with a wait hint and
/// never auto-retried.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}; wait and retry the import later")]
    RateLimit(String),

    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}

impl ProviderError {
    /// Maps a non-success HTTP status onto the error taxonomy.
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Self::Auth(format!("{context}: {status}"))
            }
            StatusCode::NOT_FOUND => Self::NotFound(context.to_string()),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimit(context.to_string()),
            _ => Self::Fetch(format!("{context}: {status}")),
        }
    }
}

/// Callback used by OAuth-based providers to obtain a fresh access token.
///
/// Invoked at most once per failing call; a second auth failure after refresh
/// is fatal to that call only.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, ProviderError>;
}

/// Credential material, varying by provider.
#[derive(Clone, Default)]
pub enum Credentials {
    /// Sleeper exposes league history without authentication.
    #[default]
    None,
    /// ESPN private leagues require the espn_s2/SWID cookie pair.
    Cookies { espn_s2: String, swid: String },
    /// Yahoo OAuth bearer token plus an optional refresh callback.
    OAuth {
        access_token: String,
        refresher: Option<Arc<dyn TokenRefresher>>,
    },
    ApiKey(String),
    /// Raw text of a user-supplied tabular export.
    CsvText(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print credential material.
        let kind = match self {
            Self::None => "None",
            Self::Cookies { .. } => "Cookies",
            Self::OAuth { .. } => "OAuth",
            Self::ApiKey(_) => "ApiKey",
            Self::CsvText(_) => "CsvText",
        };
        write!(f, "Credentials::{kind}")
    }
}

/// Opaque handle sufficient to re-fetch one season idempotently later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRef {
    pub year: i32,
    /// Provider-specific key: a Sleeper league id, a Yahoo league key, an
    /// ESPN/Fleaflicker league id reused across years.
    pub league_key: String,
}

/// Result of the discovery scan: league identity plus every visible season,
/// ordered oldest first.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub name: String,
    pub sport: String,
    pub seasons: Vec<SeasonRef>,
}

#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Enumerates every historical season visible to the credentials.
    ///
    /// Output is strictly ascending by year. Fails with
    /// [`ProviderError::Auth`] or [`ProviderError::NotFound`]; both are fatal
    /// to the job.
    async fn discover(
        &self,
        league_ref: &str,
        credentials: &Credentials,
    ) -> Result<Discovery, ProviderError>;

    /// Fetches one season and normalizes it into [`SeasonData`].
    ///
    /// Standings/roster failure fails the season; any other slice degrades to
    /// empty rather than failing.
    async fn import_season(
        &self,
        season: &SeasonRef,
        credentials: &Credentials,
    ) -> Result<SeasonData, ProviderError>;
}

/// Builds the adapter registered under `provider`, if any.
#[must_use]
pub fn adapter_for(
    provider: &str,
    archive: Option<ArchiveWriter>,
) -> Option<Arc<dyn ProviderAdapter>> {
    match provider {
        "sleeper" => Some(Arc::new(sleeper::SleeperAdapter::new(archive))),
        "espn" => Some(Arc::new(espn::EspnAdapter::new(archive))),
        "yahoo" => Some(Arc::new(yahoo::YahooAdapter::new(archive))),
        "fleaflicker" => Some(Arc::new(fleaflicker::FleaflickerAdapter::new(archive))),
        "csv" => Some(Arc::new(csv_upload::CsvAdapter::new(archive))),
        _ => None,
    }
}

pub const PROVIDER_NAMES: &[&str] = &["sleeper", "espn", "yahoo", "fleaflicker", "csv"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_taxonomy() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, "x"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::NOT_FOUND, "x"),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, "x"),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, "x"),
            ProviderError::Fetch(_)
        ));
    }

    #[test]
    fn debug_never_leaks_credentials() {
        let creds = Credentials::ApiKey("secret-key".into());
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn registry_knows_all_providers() {
        for name in PROVIDER_NAMES {
            assert!(adapter_for(name, None).is_some(), "missing adapter: {name}");
        }
        assert!(adapter_for("nfl_dot_com", None).is_none());
    }
}
