pub use super::import_jobs::Entity as ImportJobs;
pub use super::league_members::Entity as LeagueMembers;
pub use super::leagues::Entity as Leagues;
pub use super::owner_aliases::Entity as OwnerAliases;
pub use super::raw_archive::Entity as RawArchive;
pub use super::team_seasons::Entity as TeamSeasons;
