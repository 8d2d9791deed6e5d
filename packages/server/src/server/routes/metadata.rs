//! Supporting endpoints the dashboard uses to build a submission form:
//! niche expansion, scrape-mode metadata, and country/city lookups.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::kernel::jobs::DEFAULT_SITES;
use crate::server::app::AppState;

#[derive(Deserialize)]
pub struct ExpandNichesRequest {
    pub niches: Vec<String>,
}

/// POST /api/expand-niches
///
/// Pure function over the request body; nothing is persisted.
pub async fn expand_niches_handler(
    Json(request): Json<ExpandNichesRequest>,
) -> impl IntoResponse {
    let expanded = extraction::expand_niches(&request.niches);
    Json(json!({ "niches": expanded }))
}

/// GET /api/metadata
///
/// Static submission metadata plus the country list when the countries API
/// is configured.
pub async fn metadata_handler(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let countries = match &state.countries {
        Some(client) => match client.countries().await {
            Ok(list) => Some(list),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch country list");
                None
            }
        },
        None => None,
    };

    Json(json!({
        "defaultSites": DEFAULT_SITES,
        "scrapeModes": ["emails", "phones", "both"],
        "tiers": ["basic", "advance", "premium"],
        "countries": countries,
    }))
}

#[derive(Deserialize)]
pub struct LocationQuery {
    pub country: String,
}

/// GET /api/location?country=...
///
/// Cities for a country, straight from the countries API.
pub async fn location_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<LocationQuery>,
) -> impl IntoResponse {
    let Some(client) = &state.countries else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "countries API is not configured" })),
        )
            .into_response();
    };

    match client.cities(&query.country).await {
        Ok(cities) => Json(json!({ "country": query.country, "cities": cities })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, country = %query.country, "City lookup failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
