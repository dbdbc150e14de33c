//! Deduplicating short id allocation.
//!
//! This crate maps normalized URLs to short ids. Repeated submissions of the
//! same URL return the same id, including when they race each other, and new
//! ids are claimed without ever overwriting another URL's mapping.

pub mod error;
pub mod generator;
pub mod hash;
pub mod service;

pub use error::{Result, ShortenerError};
pub use generator::{random::RandomGenerator, Generator};
pub use service::{Shortener, ShortenerService, ShortenerSettings};
