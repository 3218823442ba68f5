//! Raw archive writer.
//!
//! Persists every raw provider response for audit/replay. Writes are
//! dispatched on a detached task and never awaited by the fetch path; a
//! failed archive write is logged and discarded, never retried, never
//! propagated. Normalization never reads this data back.

use crate::db::Store;
use tracing::debug;

#[derive(Clone)]
pub struct ArchiveWriter {
    store: Store,
}

impl ArchiveWriter {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Archives one raw payload keyed by provider/data type/reference.
    ///
    /// Duplicate rows across repeated imports are acceptable; the table is
    /// append-only with no uniqueness constraint.
    pub fn record(
        &self,
        provider: &str,
        data_type: &str,
        event_ref: &str,
        payload: &serde_json::Value,
        record_count: usize,
    ) {
        let store = self.store.clone();
        let provider = provider.to_string();
        let data_type = data_type.to_string();
        let event_ref = event_ref.to_string();
        let payload = payload.to_string();
        let record_count = i32::try_from(record_count).unwrap_or(i32::MAX);

        tokio::spawn(async move {
            if let Err(e) = store
                .insert_raw_record(&provider, &data_type, &event_ref, &payload, record_count)
                .await
            {
                debug!(
                    provider,
                    data_type, event_ref, "raw archive write dropped: {e}"
                );
            }
        });
    }
}
