pub mod prelude;

pub mod import_jobs;
pub mod league_members;
pub mod leagues;
pub mod owner_aliases;
pub mod raw_archive;
pub mod team_seasons;
