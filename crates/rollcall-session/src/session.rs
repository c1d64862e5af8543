//! Session types: one attendance window and the values operations return.
//!
//! An [`AttendanceSession`] is the server's record of one window. It
//! tracks:
//! - WHO opened it and WHERE students must be (`teacher_id`,
//!   `allowed_network`)
//! - WHAT they must present (the current token and its deadline)
//! - WHETHER it still accepts marks ([`SessionState`])
//!
//! Deadlines use Tokio's monotonic [`Instant`] so wall-clock jumps can't
//! revive or kill a token, and tests can drive expiry with
//! `tokio::time::advance`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rollcall_protocol::{NetworkId, SessionId, StudentId, TeacherId, Token};
use serde::Serialize;
use tokio::time::Instant;

use crate::SessionError;
use crate::token::generate_token;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of an attendance window.
///
/// ```text
///   Active ──(rotate_if_expired)──→ Active (new token)
///     │
///     └──────────(stop)──────────→ Closed
/// ```
///
/// The token lives inside `Active`, so a closed window has no token to
/// match against.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Students may mark with `token` until `token_expiry`.
    Active { token: Token, token_expiry: Instant },

    /// The teacher stopped the window. Records stay readable.
    Closed { closed_at: DateTime<Utc> },
}

// ---------------------------------------------------------------------------
// AttendanceSession
// ---------------------------------------------------------------------------

/// One attendance window.
#[derive(Debug, Clone)]
pub struct AttendanceSession {
    /// Process-unique id; records are stored under it.
    pub id: SessionId,

    /// The teacher who opened the window.
    pub teacher_id: TeacherId,

    /// The only network identifier Mark accepts. Exact match.
    pub allowed_network: NetworkId,

    /// When the window opened (monotonic).
    pub started: Instant,

    /// When the window opened (wall clock, for display).
    pub started_at: DateTime<Utc>,

    /// How many times the token has been replaced since Start.
    pub rotations: u32,

    /// Active with a token, or closed.
    pub state: SessionState,
}

impl AttendanceSession {
    pub(crate) fn open(
        id: SessionId,
        teacher_id: TeacherId,
        allowed_network: NetworkId,
        token: Token,
        now: Instant,
        ttl: Duration,
    ) -> Self {
        Self {
            id,
            teacher_id,
            allowed_network,
            started: now,
            started_at: Utc::now(),
            rotations: 0,
            state: SessionState::Active {
                token,
                token_expiry: now + ttl,
            },
        }
    }

    /// Returns `true` while the window accepts marks.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    /// The current token, or `None` once closed.
    pub fn token(&self) -> Option<&Token> {
        match &self.state {
            SessionState::Active { token, .. } => Some(token),
            SessionState::Closed { .. } => None,
        }
    }

    /// Wall-clock time the window was closed, or `None` while open.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Active { .. } => None,
            SessionState::Closed { closed_at } => Some(closed_at),
        }
    }

    /// The current token's deadline, or `None` once closed.
    pub fn token_expiry(&self) -> Option<Instant> {
        match self.state {
            SessionState::Active { token_expiry, .. } => Some(token_expiry),
            SessionState::Closed { .. } => None,
        }
    }

    /// Whole seconds until the token goes stale, floored at 0.
    pub fn expires_in(&self, now: Instant) -> u64 {
        self.token_expiry()
            .map(|expiry| expiry.saturating_duration_since(now).as_secs())
            .unwrap_or(0)
    }

    /// Replaces the token if it is past its deadline.
    ///
    /// This is the only way a token changes. The old token stops matching
    /// the moment this returns, because Mark snapshots under the same lock.
    /// Returns `true` if a new token was issued.
    pub(crate) fn rotate_if_expired(
        &mut self,
        now: Instant,
        ttl: Duration,
        token_length: usize,
    ) -> bool {
        let SessionState::Active {
            token,
            token_expiry,
        } = &mut self.state
        else {
            return false;
        };
        if now <= *token_expiry {
            return false;
        }
        *token = generate_token(token_length);
        *token_expiry = now + ttl;
        self.rotations += 1;
        tracing::debug!(
            session_id = %self.id,
            teacher = %self.teacher_id,
            rotations = self.rotations,
            "token rotated"
        );
        true
    }

    /// Closes the window and drops its token.
    pub(crate) fn close(&mut self) {
        self.state = SessionState::Closed {
            closed_at: Utc::now(),
        };
    }

    /// Copies what Mark validates against. `None` once closed.
    pub(crate) fn snapshot(&self) -> Option<SessionSnapshot> {
        match &self.state {
            SessionState::Active {
                token,
                token_expiry,
            } => Some(SessionSnapshot {
                session_id: self.id,
                token: token.clone(),
                token_expiry: *token_expiry,
                allowed_network: self.allowed_network.clone(),
            }),
            SessionState::Closed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// A consistent copy of an active session, taken under its lock.
///
/// Mark validates against this copy after releasing the lock, so a
/// concurrent rotation or Stop either happened entirely before the copy or
/// is invisible to this Mark.
#[derive(Debug, Clone)]
pub(crate) struct SessionSnapshot {
    pub(crate) session_id: SessionId,
    pub(crate) token: Token,
    pub(crate) token_expiry: Instant,
    pub(crate) allowed_network: NetworkId,
}

impl SessionSnapshot {
    /// Checks expiry, token, then network, in that order.
    pub(crate) fn check(
        &self,
        now: Instant,
        supplied_token: &Token,
        network: &NetworkId,
    ) -> Result<(), SessionError> {
        if now > self.token_expiry {
            return Err(SessionError::TokenExpired);
        }
        if supplied_token != &self.token {
            return Err(SessionError::InvalidToken);
        }
        if network != &self.allowed_network {
            return Err(SessionError::InvalidNetwork);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// Returned by [`SessionEngine::start`](crate::SessionEngine::start).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub token: Token,
    pub expires_in: u64,
}

/// Returned by [`SessionEngine::stop`](crate::SessionEngine::stop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoppedSession {
    pub session_id: SessionId,
    /// How many students marked. `None` if the store could not be asked;
    /// the window is closed either way.
    pub marked: Option<usize>,
}

/// Returned by [`SessionEngine::get_token`](crate::SessionEngine::get_token).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub token: Token,
    pub expires_in: u64,
}

/// Returned by a successful [`SessionEngine::mark`](crate::SessionEngine::mark).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkReceipt {
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub marked_at: DateTime<Utc>,
}

/// Returned by
/// [`SessionEngine::list_attendance`](crate::SessionEngine::list_attendance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceList {
    pub session_id: SessionId,
    /// Whether the listed window is still open.
    pub active: bool,
    pub student_ids: Vec<StudentId>,
    /// Wall-clock time the window opened.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the window closed, `None` while open.
    pub closed_at: Option<DateTime<Utc>>,
}
