//! Attendance sessions for Rollcall.
//!
//! This crate owns the rules of taking attendance:
//!
//! 1. **Authentication** — checking who a teacher is ([`Authenticator`],
//!    with [`TeacherDirectory`] as the built-in implementation)
//! 2. **Session lifecycle** — opening and closing attendance windows bound
//!    to a classroom network ([`SessionEngine`])
//! 3. **Token rotation** — short-lived codes a student must echo back,
//!    replaced once they expire
//! 4. **Mark validation** — accepting each student at most once per
//!    window, from the right network, with the current token
//!
//! # How it fits in the stack
//!
//! ```text
//! Server Layer (above)   ← authenticates requests, calls the engine
//!     ↕
//! Session Layer (this crate)  ← windows, tokens, mark rules
//!     ↕
//! Store Layer (below)    ← durable, de-duplicated attendance records
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod config;
mod engine;
mod error;
mod session;
mod token;

pub use auth::{Authenticator, TeacherDirectory};
pub use config::{SessionConfig, SessionScope};
pub use engine::SessionEngine;
pub use error::SessionError;
pub use session::{
    AttendanceList, AttendanceSession, MarkReceipt, SessionState, StartedSession,
    StoppedSession, TokenInfo,
};
pub use token::{TOKEN_ALPHABET, generate_token};
