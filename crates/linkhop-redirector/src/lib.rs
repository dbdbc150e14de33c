//! Redirect resolution and visit analytics.
//!
//! [`RedirectorService`] resolves short ids to their target URL, records one
//! [`VisitRecord`] per redirect and serves the aggregated [`Analytics`] of a
//! link. Visit recording is best-effort: store failures are logged and never
//! reach the caller.
//!
//! [`VisitQueue`] moves recording off the request path. Visits are spread
//! over several workers by short id, which keeps the arrival order of visits
//! for every short id.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkhop_core::{ShortId, SystemClock};
//! use linkhop_redirector::{QueueSettings, Redirector, RedirectorService, Visit, VisitQueue};
//! use linkhop_store::InMemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let redirector = Arc::new(RedirectorService::new(InMemoryStore::new(), SystemClock));
//! let queue = VisitQueue::spawn(Arc::clone(&redirector), QueueSettings::default());
//!
//! if let Some(target) = redirector.resolve("abc1234").await? {
//!     let visit = Visit::builder()
//!         .short_id(ShortId::new("abc1234")?)
//!         .client_address("203.0.113.7")
//!         .build();
//!     queue.sender().submit(visit).await;
//!     println!("redirect to {target}");
//! }
//!
//! queue.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod queue;
pub mod redirector;
pub mod service;

pub use error::{RedirectorError, Result};
pub use queue::{QueueSettings, VisitQueue, VisitSender};
pub use redirector::{Analytics, Redirector, Visit, VisitRange, VisitRecord};
pub use service::{RedirectorService, RedirectorSettings};
