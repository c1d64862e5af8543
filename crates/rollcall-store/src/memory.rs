//! In-memory record store: an actor task that owns every record.
//!
//! All reads and writes are messages on one `mpsc` channel, handled one at
//! a time by the actor. That serialization is what makes
//! [`insert_if_absent`](RecordStore::insert_if_absent) atomic: two
//! concurrent inserts for the same student are two queued commands, and the
//! second one sees the first one's write.

use std::collections::{HashMap, HashSet};

use rollcall_protocol::{SessionId, StudentId};
use tokio::sync::{mpsc, oneshot};

use crate::{AttendanceRecord, RecordStore, StoreError};

/// Default command channel size for the store actor.
const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Commands sent to the store actor. Each query carries a `oneshot` reply
/// channel.
enum StoreCommand {
    HasRecord {
        session: SessionId,
        student: StudentId,
        reply: oneshot::Sender<bool>,
    },
    Insert {
        record: AttendanceRecord,
        reply: oneshot::Sender<bool>,
    },
    List {
        session: SessionId,
        reply: oneshot::Sender<Vec<StudentId>>,
    },
    Shutdown,
}

/// Handle to the in-memory store actor.
///
/// Cheap to clone; every clone talks to the same actor. The actor stops
/// when [`shutdown`](Self::shutdown) is called or every handle is dropped.
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    sender: mpsc::Sender<StoreCommand>,
}

impl MemoryRecordStore {
    /// Spawns the store actor on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime (same as `tokio::spawn`).
    pub fn spawn() -> Self {
        Self::with_channel_size(DEFAULT_CHANNEL_SIZE)
    }

    /// Spawns the store actor with a custom command queue depth. A full
    /// queue applies backpressure to callers.
    pub fn with_channel_size(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(size.max(1));
        let actor = StoreActor {
            records: HashMap::new(),
            marked: HashSet::new(),
            receiver,
        };
        tokio::spawn(actor.run());
        Self { sender }
    }

    /// Stops the actor. Every later call on any handle returns
    /// [`StoreError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.sender
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| closed())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| closed())?;
        reply_rx.await.map_err(|_| closed())
    }
}

fn closed() -> StoreError {
    StoreError::Unavailable("memory store actor has stopped".into())
}

impl RecordStore for MemoryRecordStore {
    async fn has_record(
        &self,
        session: SessionId,
        student: &StudentId,
    ) -> Result<bool, StoreError> {
        let student = student.clone();
        self.request(|reply| StoreCommand::HasRecord {
            session,
            student,
            reply,
        })
        .await
    }

    async fn insert_if_absent(
        &self,
        record: AttendanceRecord,
    ) -> Result<bool, StoreError> {
        self.request(|reply| StoreCommand::Insert { record, reply })
            .await
    }

    async fn list_by_session(
        &self,
        session: SessionId,
    ) -> Result<Vec<StudentId>, StoreError> {
        self.request(|reply| StoreCommand::List { session, reply })
            .await
    }
}

/// The actor's private state. Runs inside a Tokio task.
struct StoreActor {
    /// Records per session, in insertion order.
    records: HashMap<SessionId, Vec<AttendanceRecord>>,
    /// Membership index for O(1) duplicate checks.
    marked: HashSet<(SessionId, StudentId)>,
    receiver: mpsc::Receiver<StoreCommand>,
}

impl StoreActor {
    async fn run(mut self) {
        tracing::debug!("record store actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                StoreCommand::HasRecord {
                    session,
                    student,
                    reply,
                } => {
                    let _ = reply.send(self.marked.contains(&(session, student)));
                }
                StoreCommand::Insert { record, reply } => {
                    let _ = reply.send(self.insert(record));
                }
                StoreCommand::List { session, reply } => {
                    let students = self
                        .records
                        .get(&session)
                        .map(|records| {
                            records.iter().map(|r| r.student_id.clone()).collect()
                        })
                        .unwrap_or_default();
                    let _ = reply.send(students);
                }
                StoreCommand::Shutdown => {
                    tracing::info!("record store shutting down");
                    break;
                }
            }
        }

        tracing::debug!("record store actor stopped");
    }

    fn insert(&mut self, record: AttendanceRecord) -> bool {
        let key = (record.session_id, record.student_id.clone());
        if !self.marked.insert(key) {
            return false;
        }
        tracing::debug!(
            session_id = %record.session_id,
            student = %record.student_id,
            "record stored"
        );
        self.records.entry(record.session_id).or_default().push(record);
        true
    }
}
