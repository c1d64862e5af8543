//! Error types for the record store.

/// Errors a [`RecordStore`](crate::RecordStore) can report.
///
/// Every variant is an infrastructure failure, never a business outcome:
/// "already marked" is the `Ok(false)` of
/// [`insert_if_absent`](crate::RecordStore::insert_if_absent), not an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot take requests right now (actor stopped, database
    /// unreachable, ...). Callers may retry later.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}
