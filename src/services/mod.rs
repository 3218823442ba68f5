pub mod archive;
pub use archive::ArchiveWriter;

pub mod identity;

pub mod import_service;
pub use import_service::{ImportError, ImportOutcome, ImportRequest, ImportService};

pub mod import_service_impl;
pub use import_service_impl::SeaOrmImportService;

pub mod health_service;
pub use health_service::{
    HealthError, HealthIssue, HealthReport, HealthService, HealthStatus, IssueKind, Severity,
};

pub mod health_service_impl;
pub use health_service_impl::SeaOrmHealthService;
