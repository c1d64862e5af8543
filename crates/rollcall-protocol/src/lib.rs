//! Wire protocol for Rollcall.
//!
//! This crate defines what travels between the attendance server and its
//! clients (the teacher's dashboard and the students' phones):
//!
//! - **Identity types** ([`TeacherId`], [`StudentId`], [`NetworkId`],
//!   [`SessionId`], [`Token`]) — shared by every layer above.
//! - **Messages** ([`Request`], [`Response`], [`Envelope`]) — the
//!   request/response pairs a client can exchange with the server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — bytes ⇄ messages.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session engine (attendance)
//! ```

mod codec;
mod error;
mod ids;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use ids::{NetworkId, SessionId, StudentId, TeacherId, Token};
pub use types::{Envelope, Payload, Request, Response};
