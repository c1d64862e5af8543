//! Identity newtypes shared by every Rollcall crate.
//!
//! Teachers, students and networks are all identified by strings on the
//! wire, which makes them easy to mix up. Each gets its own newtype so the
//! compiler catches `mark(student, teacher, ..)` argument swaps.
//!
//! All of them serialize transparently: `TeacherId("alice")` is `"alice"`
//! in JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines a transparent string newtype with the usual conversions.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the raw string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is empty or only whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// The identity of a teacher (the name they registered with).
    TeacherId
);

string_id!(
    /// A student's identity, usually their roll number.
    StudentId
);

string_id!(
    /// An opaque identifier for the classroom network, typically the access
    /// point's BSSID (`"AA:BB:CC:DD:EE:FF"`).
    ///
    /// The value is supplied by the client and compared byte for byte; it is
    /// not proof of physical presence.
    NetworkId
);

string_id!(
    /// A short-lived attendance token shown on the classroom screen.
    ///
    /// Comparison is exact and case-sensitive: `"X7K2Q9RT"` and
    /// `"x7k2q9rt"` are different tokens.
    Token
);

/// Identifies one attendance window.
///
/// Every `Start` creates a new session id, so the records of two windows
/// opened by the same teacher never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}
