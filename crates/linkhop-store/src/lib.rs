//! Key-value store backends.
//!
//! [`RedisStore`] is the production backend. [`InMemoryStore`] implements the
//! same single-key atomicity guarantees inside one process and backs unit
//! tests and the `in-memory` gateway mode.

pub mod memory;
pub mod redis;

pub use memory::InMemoryStore;
pub use self::redis::{RedisStore, WindowClock};
