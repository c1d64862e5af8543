//! # Rollcall
//!
//! Classroom attendance over WebSocket.
//!
//! A teacher opens an attendance window bound to the classroom network and
//! shows a short token that rotates every few seconds. Students submit the
//! token from the same network; each student is recorded at most once per
//! window. Rollcall handles transport, credentials, token rotation and
//! de-duplication; you pick the [`Authenticator`](rollcall_session::Authenticator)
//! and [`RecordStore`](rollcall_store::RecordStore).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollcall::prelude::*;
//!
//! # async fn run() -> Result<(), RollcallError> {
//! let teachers = TeacherDirectory::with_teachers([("alice", "pw1")]);
//! let server = RollcallServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(teachers, MemoryRecordStore::spawn())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::RollcallError;
pub use server::{RollcallServer, RollcallServerBuilder};

/// Everything needed to run a server or talk to one from Rust.
pub mod prelude {
    pub use crate::{RollcallError, RollcallServer, RollcallServerBuilder, ServerConfig};
    pub use rollcall_protocol::{
        Codec, Envelope, JsonCodec, NetworkId, Payload, Request, Response, SessionId, StudentId,
        TeacherId, Token,
    };
    pub use rollcall_session::{
        Authenticator, SessionConfig, SessionEngine, SessionError, SessionScope,
        TeacherDirectory,
    };
    pub use rollcall_store::{AttendanceRecord, MemoryRecordStore, RecordStore, StoreError};
    pub use rollcall_sweep::SweepConfig;
}
