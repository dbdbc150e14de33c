use std::sync::Arc;

use linkhop_normalizer::UrlNormalizer;
use linkhop_ratelimit::Limiter;
use linkhop_redirector::{Redirector, VisitSender};
use linkhop_scanner::Classifier;
use linkhop_shortener::Shortener;
use typed_builder::TypedBuilder;

#[derive(Clone, TypedBuilder)]
pub struct AppState {
    pub shortener: Arc<dyn Shortener>,
    pub redirector: Arc<dyn Redirector>,
    pub limiter: Arc<dyn Limiter>,
    /// Malicious URL check on creation; skipped when `None`.
    #[builder(default)]
    pub classifier: Option<Arc<dyn Classifier>>,
    #[builder(default)]
    pub normalizer: Arc<UrlNormalizer>,
    pub visits: VisitSender,
    #[builder(setter(into))]
    pub base_url: String,
    /// Identify clients by `X-Forwarded-For` instead of the peer address.
    #[builder(default)]
    pub trust_forwarded: bool,
}
