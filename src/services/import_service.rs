//! Domain service for league history imports.
//!
//! This module provides the [`ImportService`] trait: one call runs the whole
//! scan-then-import job for a league and returns the outcome once the job
//! reaches a terminal status.

use crate::domain::{LeagueId, UserId};
use crate::entities::import_jobs;
use crate::providers::{Credentials, ProviderError};
use thiserror::Error;

/// Domain errors for import operations.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Adapter failure fatal to the job; carries the adapter's message
    /// verbatim.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Merge target league not found: {0}")]
    LeagueNotFound(LeagueId),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ImportError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Everything needed to run one import job.
#[derive(Clone)]
pub struct ImportRequest {
    pub provider: String,
    /// Provider-specific league reference: an id, a key, or (for the offline
    /// provider) a league name.
    pub league_ref: String,
    pub user_id: UserId,
    pub credentials: Credentials,
    /// How the importer is named on rosters, if they told us.
    pub display_name: Option<String>,
    /// Merge into this existing league instead of find-or-create by name.
    pub target_league_id: Option<LeagueId>,
    /// Import only these years; `None` means every discovered season.
    pub selected_seasons: Option<Vec<i32>>,
}

/// Terminal result of a completed job.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub import_id: String,
    pub league_id: LeagueId,
    pub league_name: String,
    pub seasons_imported: Vec<i32>,
    pub repaired_seasons: Vec<i32>,
    pub total_seasons: usize,
}

/// Domain service trait for import orchestration.
#[async_trait::async_trait]
pub trait ImportService: Send + Sync {
    /// Runs a full import job to its terminal status.
    ///
    /// The job reaches COMPLETE even when individual seasons or teams fail;
    /// only a discovery failure or an error escaping the per-season boundary
    /// is fatal.
    ///
    /// # Errors
    ///
    /// - Returns [`ImportError::Provider`] when discovery fails
    /// - Returns [`ImportError::LeagueNotFound`] when a merge target is given
    ///   but missing
    async fn run_full_import(&self, request: ImportRequest) -> Result<ImportOutcome, ImportError>;

    /// Most recent jobs, newest first.
    async fn list_jobs(&self, limit: u64) -> Result<Vec<import_jobs::Model>, ImportError>;

    async fn get_job(&self, id: &str) -> Result<Option<import_jobs::Model>, ImportError>;
}
