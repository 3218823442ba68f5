use crate::entities::{prelude::*, raw_archive};
use anyhow::Result;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};

pub struct ArchiveRepository {
    conn: DatabaseConnection,
}

impl ArchiveRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(
        &self,
        provider: &str,
        data_type: &str,
        event_ref: &str,
        payload: &str,
        record_count: i32,
    ) -> Result<()> {
        let model = raw_archive::ActiveModel {
            provider: Set(provider.to_string()),
            data_type: Set(data_type.to_string()),
            event_ref: Set(event_ref.to_string()),
            payload: Set(payload.to_string()),
            record_count: Set(record_count),
            ingested_at: Set(Some(chrono::Utc::now().to_rfc3339())),
            ..Default::default()
        };
        RawArchive::insert(model)
            .exec_without_returning(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn count_for_provider(&self, provider: &str) -> Result<u64> {
        let count = RawArchive::find()
            .filter(raw_archive::Column::Provider.eq(provider))
            .count(&self.conn)
            .await?;
        Ok(count)
    }
}
