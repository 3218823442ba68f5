use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Leagues)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(LeagueMembers)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(ImportJobs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(TeamSeasons)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(RawArchive)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(OwnerAliases)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let conn = manager.get_connection();

        // Upserts key on this; one row per owner per league-season.
        conn.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_team_seasons_league_year_owner \
             ON team_seasons(league_id, season_year, owner_name)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_team_seasons_league ON team_seasons(league_id)",
        )
        .await?;

        conn.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_import_jobs_owner ON import_jobs(owner_user_id)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OwnerAliases).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawArchive).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamSeasons).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ImportJobs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LeagueMembers).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Leagues).to_owned())
            .await?;
        Ok(())
    }
}
