use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{LinkPreviewDto, LinkPreviewRequest};
use crate::state::AppState;

/// Parse the raw body leniently: any content type is accepted as long as it
/// is a JSON object with a non-blank string `url`.
pub fn parse_request(body: &[u8]) -> AppResult<LinkPreviewRequest> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| AppError::Validation("Invalid JSON body".into()))?;

    let url = value
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("Missing url".into()))?;

    Ok(LinkPreviewRequest {
        url: url.to_string(),
    })
}

/// POST /api/link-preview
///
/// Body: `{ "url": "https://..." }`. Fetches the page and returns its title,
/// site name, representative image and favicon. Rejects non-http(s) schemes
/// (422) and local or private-network hosts (400).
pub async fn create_link_preview(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<LinkPreviewDto>> {
    let request = parse_request(&body)?;
    let dto = state.previewer.preview(&request.url).await?;
    tracing::info!(url = %dto.url, has_image = dto.image_url.is_some(), "Built link preview");
    Ok(Json(dto))
}
