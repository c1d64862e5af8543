//! Session engine configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many windows may be open at once.
///
/// Deployments disagree here: a department server wants one window per
/// teacher, a single-classroom kiosk wants exactly one window overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionScope {
    /// Each teacher may have one open window; teachers never block each
    /// other.
    #[default]
    PerTeacher,
    /// One open window for the whole server. While it is open, every other
    /// teacher's Start fails with `AlreadyActive`.
    Global,
}

impl fmt::Display for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerTeacher => write!(f, "per-teacher"),
            Self::Global => write!(f, "global"),
        }
    }
}

impl FromStr for SessionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-teacher" | "teacher" => Ok(Self::PerTeacher),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown session scope {other:?}")),
        }
    }
}

/// Configuration for the [`SessionEngine`](crate::SessionEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a token stays valid after it is generated. Default: 15 s.
    pub token_ttl: Duration,

    /// Characters per token. Default: 8.
    pub token_length: usize,

    /// One window per teacher or one overall.
    pub scope: SessionScope,

    /// Upper bound on any single record-store call. A store that does not
    /// answer in time fails the operation with `StoreUnavailable`.
    /// Default: 2 s.
    pub store_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(15),
            token_length: 8,
            scope: SessionScope::PerTeacher,
            store_timeout: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// Shortest token a config may ask for.
    pub const MIN_TOKEN_LENGTH: usize = 4;
    /// Longest token a config may ask for.
    pub const MAX_TOKEN_LENGTH: usize = 64;

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// Called by [`SessionEngine::new`](crate::SessionEngine::new). Rules:
    /// - `token_ttl` of zero becomes 1 s; a token must outlive the instant
    ///   it was issued.
    /// - `token_length` clamped to
    ///   [`MIN_TOKEN_LENGTH`](Self::MIN_TOKEN_LENGTH)..=[`MAX_TOKEN_LENGTH`](Self::MAX_TOKEN_LENGTH).
    /// - `store_timeout` of zero falls back to the default.
    pub fn validated(mut self) -> Self {
        if self.token_ttl.is_zero() {
            tracing::warn!("token_ttl is zero — using 1s");
            self.token_ttl = Duration::from_secs(1);
        }
        let clamped = self
            .token_length
            .clamp(Self::MIN_TOKEN_LENGTH, Self::MAX_TOKEN_LENGTH);
        if clamped != self.token_length {
            tracing::warn!(
                requested = self.token_length,
                using = clamped,
                "token_length out of range — clamping"
            );
            self.token_length = clamped;
        }
        if self.store_timeout.is_zero() {
            tracing::warn!("store_timeout is zero — using default");
            self.store_timeout = Self::default().store_timeout;
        }
        self
    }
}
