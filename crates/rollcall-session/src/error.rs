//! Error types for the session layer.

use rollcall_protocol::{StudentId, TeacherId};
use rollcall_store::StoreError;

/// Everything that can go wrong in a session operation.
///
/// Three families:
///
/// - **Caller bugs**: [`Validation`](Self::Validation). Never retried.
/// - **Business outcomes**: auth failures and the attendance rules
///   (`NoActiveSession` through `DuplicateMark`). Expected, user-facing,
///   and final for the request.
/// - **Infrastructure**: [`StoreUnavailable`](Self::StoreUnavailable). The
///   only retryable variant; the engine itself never retries.
///
/// Each Mark check has its own variant so callers can tell exactly which
/// step rejected the submission.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A required field was missing or blank.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The teacher's credentials were rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Registration was attempted for a name that already exists.
    #[error("teacher {0} is already registered")]
    TeacherExists(TeacherId),

    /// There is no open window for this teacher.
    #[error("no active session for teacher {0}")]
    NoActiveSession(TeacherId),

    /// A window is already open. Carries the teacher who owns it, which
    /// differs from the caller only in global scope.
    #[error("a session is already active for teacher {0}")]
    AlreadyActive(TeacherId),

    /// The window's current token went stale before the mark arrived.
    #[error("token has expired")]
    TokenExpired,

    /// The supplied token does not match the current one.
    #[error("invalid token")]
    InvalidToken,

    /// The supplied network identifier is not the classroom's.
    #[error("invalid network: connection must be from the classroom network")]
    InvalidNetwork,

    /// The student already has a mark in this window.
    #[error("attendance already marked for {0} in this session")]
    DuplicateMark(StudentId),

    /// The record store failed or did not answer within the configured
    /// timeout.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl SessionError {
    /// Stable name of the failure, sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::AuthFailed(_) => "AuthError",
            Self::TeacherExists(_) => "TeacherExists",
            Self::NoActiveSession(_) => "NoActiveSession",
            Self::AlreadyActive(_) => "AlreadyActive",
            Self::TokenExpired => "TokenExpired",
            Self::InvalidToken => "InvalidToken",
            Self::InvalidNetwork => "InvalidNetwork",
            Self::DuplicateMark(_) => "DuplicateMark",
            Self::StoreUnavailable(_) => "StoreUnavailable",
        }
    }

    /// Whether a caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
