//! The attendance record and the storage seam the session engine writes
//! through.

use std::future::Future;

use chrono::{DateTime, Utc};
use rollcall_protocol::{SessionId, StudentId};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// One student's mark within one attendance window. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// The window this mark belongs to.
    pub session_id: SessionId,
    /// Who marked.
    pub student_id: StudentId,
    /// Wall-clock time the mark was accepted.
    pub marked_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Creates a record stamped with the current time.
    pub fn now(session_id: SessionId, student_id: StudentId) -> Self {
        Self {
            session_id,
            student_id,
            marked_at: Utc::now(),
        }
    }
}

/// Durable, append-only storage for attendance records.
///
/// The one hard requirement is on [`insert_if_absent`](Self::insert_if_absent):
/// it must be atomic for concurrent callers inserting the same
/// `(session_id, student_id)` pair. Two marks racing past the engine's
/// read-only [`has_record`](Self::has_record) check both land here, and
/// exactly one of them may see `true`.
pub trait RecordStore: Send + Sync + 'static {
    /// Returns `true` if `student` already has a record in `session`.
    fn has_record(
        &self,
        session: SessionId,
        student: &StudentId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Stores `record` unless its `(session_id, student_id)` pair already
    /// exists. Returns whether it was inserted.
    fn insert_if_absent(
        &self,
        record: AttendanceRecord,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Students who marked in `session`, in the order they marked.
    fn list_by_session(
        &self,
        session: SessionId,
    ) -> impl Future<Output = Result<Vec<StudentId>, StoreError>> + Send;
}
