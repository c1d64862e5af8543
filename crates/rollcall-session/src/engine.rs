//! The session engine: opens and closes attendance windows, rotates their
//! tokens, and decides whether a student's mark is accepted.
//!
//! # Concurrency
//!
//! Every scope key (a teacher, or one shared key in global scope) owns a
//! `tokio::sync::Mutex<SessionSlot>`, found through a `DashMap`. Start,
//! Stop, token rotation and the snapshot step of Mark all run under that
//! key's lock, so two teachers never contend and one teacher's operations
//! never see a half-rotated token.
//!
//! Mark releases the lock before talking to the record store. The store's
//! atomic `insert_if_absent` is what guarantees one mark per student; the
//! `has_record` probe before it only saves a write.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rollcall_protocol::{NetworkId, SessionId, StudentId, TeacherId, Token};
use rollcall_store::{AttendanceRecord, RecordStore, StoreError};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::token::generate_token;
use crate::{
    AttendanceList, AttendanceSession, MarkReceipt, SessionConfig, SessionError,
    SessionScope, StartedSession, StoppedSession, TokenInfo,
};

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Map key used for every teacher in [`SessionScope::Global`].
const GLOBAL_SCOPE_KEY: &str = "*";

/// What one scope key holds: the open window, or the most recently closed
/// one so its attendance can still be listed.
#[derive(Debug, Default)]
struct SessionSlot {
    current: Option<AttendanceSession>,
}

impl SessionSlot {
    /// The active session, if `teacher` owns it.
    fn active_for(&self, teacher: &TeacherId) -> Option<&AttendanceSession> {
        self.current
            .as_ref()
            .filter(|s| s.is_active() && &s.teacher_id == teacher)
    }

    fn active_for_mut(&mut self, teacher: &TeacherId) -> Option<&mut AttendanceSession> {
        self.current
            .as_mut()
            .filter(|s| s.is_active() && &s.teacher_id == teacher)
    }

    /// The latest session `teacher` owns, active or closed.
    fn latest_for(&self, teacher: &TeacherId) -> Option<&AttendanceSession> {
        self.current.as_ref().filter(|s| &s.teacher_id == teacher)
    }
}

/// Owns every attendance window and enforces the marking rules.
///
/// Shared across connection tasks behind an `Arc`; every method takes
/// `&self`.
///
/// ## Lifecycle
///
/// ```text
/// start() ──→ [Active] ──get_token()/rotate_expired()──→ [Active, new token]
///                │
///                └──stop()──→ [Closed] ──start()──→ [Active] (new SessionId)
/// ```
pub struct SessionEngine<S: RecordStore> {
    slots: DashMap<TeacherId, Arc<Mutex<SessionSlot>>>,
    store: S,
    config: SessionConfig,
}

impl<S: RecordStore> SessionEngine<S> {
    /// Creates an engine writing marks to `store`.
    pub fn new(config: SessionConfig, store: S) -> Self {
        Self {
            slots: DashMap::new(),
            store,
            config: config.validated(),
        }
    }

    /// The effective (validated) configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The record store marks are written to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens a window for `teacher` bound to `network` and issues its first
    /// token.
    ///
    /// # Errors
    /// - [`SessionError::Validation`] — blank teacher or network
    /// - [`SessionError::AlreadyActive`] — a window is already open for this
    ///   scope key
    pub async fn start(
        &self,
        teacher: &TeacherId,
        network: &NetworkId,
    ) -> Result<StartedSession, SessionError> {
        require("teacher", teacher.is_blank())?;
        require("network", network.is_blank())?;

        let slot = self.slot_or_insert(teacher);
        let mut slot = slot.lock().await;

        if let Some(current) = slot.current.as_ref().filter(|s| s.is_active()) {
            return Err(SessionError::AlreadyActive(current.teacher_id.clone()));
        }

        let now = Instant::now();
        let session_id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        let token = generate_token(self.config.token_length);
        let session = AttendanceSession::open(
            session_id,
            teacher.clone(),
            network.clone(),
            token.clone(),
            now,
            self.config.token_ttl,
        );
        let expires_in = session.expires_in(now);
        // Replacing a closed predecessor is fine: its records are keyed by
        // its own SessionId and stay in the store.
        slot.current = Some(session);

        tracing::info!(%teacher, %session_id, %network, "attendance session started");

        Ok(StartedSession {
            session_id,
            token,
            expires_in,
        })
    }

    /// Closes `teacher`'s window. The token stops working immediately;
    /// recorded marks stay listable.
    ///
    /// # Errors
    /// Returns [`SessionError::NoActiveSession`] if nothing is open.
    pub async fn stop(&self, teacher: &TeacherId) -> Result<StoppedSession, SessionError> {
        let slot = self
            .slot(teacher)
            .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;

        let session_id = {
            let mut slot = slot.lock().await;
            let session = slot
                .active_for_mut(teacher)
                .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
            session.close();
            session.id
        };

        // The window is closed regardless of what the store says next.
        let marked = match self.with_store_timeout(self.store.list_by_session(session_id)).await
        {
            Ok(students) => Some(students.len()),
            Err(e) => {
                tracing::warn!(%teacher, %session_id, error = %e, "could not count marks");
                None
            }
        };

        tracing::info!(%teacher, %session_id, ?marked, "attendance session stopped");

        Ok(StoppedSession { session_id, marked })
    }

    /// Returns the current token, rotating it first if it has expired.
    ///
    /// # Errors
    /// Returns [`SessionError::NoActiveSession`] if nothing is open.
    pub async fn get_token(&self, teacher: &TeacherId) -> Result<TokenInfo, SessionError> {
        let slot = self
            .slot(teacher)
            .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
        let mut slot = slot.lock().await;
        let session = slot
            .active_for_mut(teacher)
            .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;

        let now = Instant::now();
        session.rotate_if_expired(now, self.config.token_ttl, self.config.token_length);

        let token = session
            .token()
            .cloned()
            .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
        Ok(TokenInfo {
            token,
            expires_in: session.expires_in(now),
        })
    }

    /// Rotates `teacher`'s token if it has expired, without reading it.
    ///
    /// Returns `true` if a new token was issued.
    ///
    /// # Errors
    /// Returns [`SessionError::NoActiveSession`] if nothing is open.
    pub async fn rotate_if_expired(&self, teacher: &TeacherId) -> Result<bool, SessionError> {
        let slot = self
            .slot(teacher)
            .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
        let mut slot = slot.lock().await;
        let session = slot
            .active_for_mut(teacher)
            .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;

        Ok(session.rotate_if_expired(
            Instant::now(),
            self.config.token_ttl,
            self.config.token_length,
        ))
    }

    /// Rotates every expired token. Returns how many were replaced.
    ///
    /// Meant for a periodic sweep so a classroom screen that polls slowly
    /// still finds a fresh token waiting.
    pub async fn rotate_expired(&self) -> usize {
        // Clone the handles out first; holding a DashMap shard guard across
        // `.await` would block `start` for unrelated teachers.
        let slots: Vec<_> = self.slots.iter().map(|e| Arc::clone(e.value())).collect();

        let mut rotated = 0;
        for slot in slots {
            let mut slot = slot.lock().await;
            if let Some(session) = slot.current.as_mut() {
                let now = Instant::now();
                if session.rotate_if_expired(now, self.config.token_ttl, self.config.token_length)
                {
                    rotated += 1;
                }
            }
        }
        rotated
    }

    /// Records `student` as present in `teacher`'s open window.
    ///
    /// Checks run in a fixed order and the first failure wins:
    ///
    /// 1. blank fields → [`SessionError::Validation`]
    /// 2. no open window → [`SessionError::NoActiveSession`]
    /// 3. token past its deadline → [`SessionError::TokenExpired`]
    /// 4. token mismatch → [`SessionError::InvalidToken`]
    /// 5. network mismatch → [`SessionError::InvalidNetwork`]
    /// 6. already marked → [`SessionError::DuplicateMark`]
    ///
    /// Steps 3–5 use one snapshot of the session. Store failures or
    /// timeouts surface as [`SessionError::StoreUnavailable`] and leave no
    /// record behind.
    pub async fn mark(
        &self,
        teacher: &TeacherId,
        student: &StudentId,
        network: &NetworkId,
        supplied_token: &Token,
    ) -> Result<MarkReceipt, SessionError> {
        require("teacher", teacher.is_blank())?;
        require("student", student.is_blank())?;
        require("network", network.is_blank())?;
        require("token", supplied_token.is_blank())?;

        let (snapshot, now) = {
            let slot = self
                .slot(teacher)
                .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
            let slot = slot.lock().await;
            let snapshot = slot
                .active_for(teacher)
                .and_then(AttendanceSession::snapshot)
                .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
            (snapshot, Instant::now())
        };

        snapshot.check(now, supplied_token, network)?;
        let session_id = snapshot.session_id;

        if self
            .with_store_timeout(self.store.has_record(session_id, student))
            .await?
        {
            return Err(SessionError::DuplicateMark(student.clone()));
        }

        let record = AttendanceRecord::now(session_id, student.clone());
        let marked_at = record.marked_at;
        if !self
            .with_store_timeout(self.store.insert_if_absent(record))
            .await?
        {
            // Lost the race to a concurrent mark for the same student.
            return Err(SessionError::DuplicateMark(student.clone()));
        }

        tracing::info!(%teacher, %session_id, %student, "attendance marked");

        Ok(MarkReceipt {
            session_id,
            student_id: student.clone(),
            marked_at,
        })
    }

    /// Students who marked in `teacher`'s open window, or in the most
    /// recently closed one if nothing is open.
    ///
    /// # Errors
    /// Returns [`SessionError::NoActiveSession`] if `teacher` has no window
    /// on record.
    pub async fn list_attendance(
        &self,
        teacher: &TeacherId,
    ) -> Result<AttendanceList, SessionError> {
        let (session_id, active, started_at, closed_at) = {
            let slot = self
                .slot(teacher)
                .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
            let slot = slot.lock().await;
            let session = slot
                .latest_for(teacher)
                .ok_or_else(|| SessionError::NoActiveSession(teacher.clone()))?;
            (
                session.id,
                session.is_active(),
                session.started_at,
                session.closed_at(),
            )
        };

        let student_ids = self
            .with_store_timeout(self.store.list_by_session(session_id))
            .await?;

        Ok(AttendanceList {
            session_id,
            active,
            student_ids,
            started_at,
            closed_at,
        })
    }

    /// A copy of `teacher`'s latest session, active or closed.
    pub async fn session(&self, teacher: &TeacherId) -> Option<AttendanceSession> {
        let slot = self.slot(teacher)?;
        let slot = slot.lock().await;
        slot.latest_for(teacher).cloned()
    }

    /// Number of windows currently open.
    pub async fn active_count(&self) -> usize {
        let slots: Vec<_> = self.slots.iter().map(|e| Arc::clone(e.value())).collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.current.as_ref().is_some_and(|s| s.is_active()) {
                count += 1;
            }
        }
        count
    }

    // -- internals --------------------------------------------------------

    fn scope_key(&self, teacher: &TeacherId) -> TeacherId {
        match self.config.scope {
            SessionScope::PerTeacher => teacher.clone(),
            SessionScope::Global => TeacherId::from(GLOBAL_SCOPE_KEY),
        }
    }

    /// Looks up the slot for `teacher` without creating one, so marks for
    /// unknown teachers don't grow the map.
    fn slot(&self, teacher: &TeacherId) -> Option<Arc<Mutex<SessionSlot>>> {
        self.slots
            .get(&self.scope_key(teacher))
            .map(|entry| Arc::clone(entry.value()))
    }

    fn slot_or_insert(&self, teacher: &TeacherId) -> Arc<Mutex<SessionSlot>> {
        Arc::clone(self.slots.entry(self.scope_key(teacher)).or_default().value())
    }

    async fn with_store_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, SessionError> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(SessionError::from),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "record store call timed out"
                );
                Err(SessionError::StoreUnavailable(format!(
                    "no answer within {:?}",
                    self.config.store_timeout
                )))
            }
        }
    }
}

fn require(field: &str, blank: bool) -> Result<(), SessionError> {
    if blank {
        return Err(SessionError::Validation(format!("missing {field}")));
    }
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================
