//! HTTP gateway of the linkhop URL shortener.
//!
//! | Route                      | Handler                |
//! |----------------------------|------------------------|
//! | `POST /shorten`            | [`handlers::shorten_handler`]   |
//! | `GET /{short_id}`          | [`handlers::redirect_handler`]  |
//! | `GET /analytics/{short_id}`| [`handlers::analytics_handler`] |
//! | `GET /health`              | [`handlers::health_handler`]    |

pub mod app;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod server;
pub mod state;

pub use app::App;
pub use state::AppState;
