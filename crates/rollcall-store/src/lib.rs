//! Attendance record storage for Rollcall.
//!
//! The session engine decides *whether* a student may mark; this crate
//! remembers *who did*. It provides:
//!
//! - [`RecordStore`] — the trait the engine writes through. Swap in a
//!   database-backed implementation by implementing it.
//! - [`MemoryRecordStore`] — the built-in implementation: an actor task
//!   owning all records, reached through a cheap cloneable handle.
//! - [`AttendanceRecord`] and [`StoreError`].

mod error;
mod memory;
mod record;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use record::{AttendanceRecord, RecordStore};
