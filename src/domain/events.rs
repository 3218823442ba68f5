//! Domain events for the import pipeline.
//!
//! Events are broadcast on a tokio channel so observers (CLI progress output,
//! future notification surfaces) can follow a job without the season loop
//! ever suspending on them.

use serde::Serialize;

/// Milestones emitted by the import orchestrator.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ImportEvent {
    ScanStarted {
        job_id: String,
        provider: String,
    },
    ScanFinished {
        job_id: String,
        seasons_found: i32,
    },
    SeasonImported {
        job_id: String,
        year: i32,
        teams: i32,
    },
    SeasonFailed {
        job_id: String,
        year: i32,
        message: String,
    },
    SeasonRepaired {
        job_id: String,
        year: i32,
    },
    ImportFinished {
        job_id: String,
        seasons_imported: i32,
        seasons_failed: i32,
    },
    ImportFailed {
        job_id: String,
        message: String,
    },
}
