use serde::Serialize;

/// Body of `POST /api/link-preview`, after validation in the handler.
#[derive(Debug, Clone)]
pub struct LinkPreviewRequest {
    pub url: String,
}

/// Preview metadata returned by `POST /api/link-preview`.
///
/// All fields except `url` are best-effort and omitted from the JSON when
/// absent. `url` is the final URL after redirects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPreviewDto {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
}
