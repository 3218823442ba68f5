pub mod archive;
pub mod import_job;
pub mod league;
pub mod team_season;
