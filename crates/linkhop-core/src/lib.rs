//! Core types and traits for the linkhop URL shortener.
//!
//! This crate provides the types shared by the shortener, the redirector and
//! the rate limiter: validated identifiers, the key layout, the key-value
//! store contract and the clock abstraction.

pub mod clock;
pub mod error;
pub mod keys;
pub mod short_id;
pub mod store;
pub mod url;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, StoreError};
pub use keys::KeySpace;
pub use short_id::ShortId;
pub use store::{KeyValueStore, WindowAdmission};
pub use url::NormalizedUrl;
