use crate::error::{AppError, Result};
use crate::middleware::client_address;
use crate::model::{AnalyticsQuery, AnalyticsResponse, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, Extensions, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use linkhop_core::ShortId;
use linkhop_redirector::{Visit, VisitRange};
use tracing::{debug, info, warn};

/// `POST /shorten`
///
/// Normalizes the submitted URL, rejects it if the scanner flags it and
/// returns the canonical short id for it.
pub async fn shorten_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let url = state.normalizer.normalize(&request.url)?;

    if let Some(classifier) = &state.classifier {
        if classifier.classify(&url).await.is_malicious() {
            warn!(url = %url, "rejecting malicious url");
            return Err(AppError::Validation("url is flagged as malicious".to_string()));
        }
    }

    let short_id = state.shortener.resolve_or_create(&url).await?;
    info!(code = %short_id, url = %url, "url shortened");

    Ok(Json(ShortenResponse {
        short_url: short_id.to_url(&state.base_url),
        short_id: short_id.into(),
    }))
}

/// `GET /{short_id}`
///
/// Redirects with `302 Found` and queues a visit for analytics.
pub async fn redirect_handler(
    Path(short_id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<Response> {
    let Some(target) = state.redirector.resolve(&short_id).await? else {
        return Err(AppError::NotFound(format!("short id '{short_id}' not found")));
    };

    // resolve only succeeds for well-formed ids
    if let Ok(id) = ShortId::new(short_id) {
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let visit = Visit::builder()
            .short_id(id)
            .client_address(client_address(&headers, &extensions, state.trust_forwarded))
            .user_agent(header_str(header::USER_AGENT))
            .referrer(header_str(header::REFERER))
            .build();
        state.visits.submit(visit).await;
    }

    debug!(target = %target, "redirecting");
    Ok((StatusCode::FOUND, [(header::LOCATION, target.into_string())]).into_response())
}

/// `GET /analytics/{short_id}`
pub async fn analytics_handler(
    Path(short_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>> {
    let range = VisitRange::new(query.offset.unwrap_or(0), query.limit);
    let analytics = state.redirector.get_analytics(&short_id, range).await?;

    Ok(Json(AnalyticsResponse {
        short_url: ShortId::new_unchecked(short_id.as_str()).to_url(&state.base_url),
        short_id,
        total_clicks: analytics.total_clicks,
        visits: analytics.visits,
    }))
}
