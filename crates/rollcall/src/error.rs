//! Unified error type for the Rollcall server.

use rollcall_protocol::ProtocolError;
use rollcall_session::SessionError;
use rollcall_store::StoreError;
use rollcall_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `rollcall` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RollcallError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, token, network, duplicate mark).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The record store failed outside of a session operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}
