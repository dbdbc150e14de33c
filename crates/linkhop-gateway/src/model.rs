mod health;
mod url;

pub use health::HealthResponse;
pub use url::{AnalyticsQuery, AnalyticsResponse, ShortenRequest, ShortenResponse};
