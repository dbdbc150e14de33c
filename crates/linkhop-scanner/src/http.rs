use std::time::Duration;

use crate::error::{Result, ScanError};
use crate::{Classifier, Verdict};
use async_trait::async_trait;
use linkhop_core::NormalizedUrl;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, TypedBuilder)]
pub struct HttpClassifierConfig {
    /// Base URL of the scanning service, without the `/scan` path.
    #[builder(setter(into))]
    pub base_url: String,
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
}

#[derive(Serialize)]
struct ScanRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ScanResponse {
    label: Option<String>,
}

/// Classifies URLs by posting them to `{base_url}/scan`.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(config: HttpClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ScanError::Client)?;

        Ok(Self {
            client,
            endpoint: format!("{}/scan", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Asks the scanner about `url`. Unlike [`Classifier::classify`] this
    /// reports why no verdict could be reached.
    pub async fn scan(&self, url: &NormalizedUrl) -> Result<Verdict> {
        let response: ScanResponse = self
            .client
            .post(&self.endpoint)
            .json(&ScanRequest { url: url.as_str() })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.label.as_deref().map(Verdict::from_label) {
            None | Some(Verdict::Unknown) => Err(ScanError::MissingLabel),
            Some(verdict) => Ok(verdict),
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, url: &NormalizedUrl) -> Verdict {
        match self.scan(url).await {
            Ok(verdict) => {
                debug!(url = %url, verdict = %verdict, "url scanned");
                verdict
            }
            Err(e) => {
                warn!(url = %url, error = %e, "url scan failed");
                Verdict::Unknown
            }
        }
    }
}
