use linkhop_redirector::VisitRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenResponse {
    pub short_id: String,
    pub short_url: String,
}

/// Optional paging of the visit log.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub short_id: String,
    pub short_url: String,
    pub total_clicks: u64,
    pub visits: Vec<VisitRecord>,
}
