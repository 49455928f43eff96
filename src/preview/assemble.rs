use url::Url;

use super::extract::{ExtractedMetadata, IconLink};
use super::fetch::RawDocument;
use super::image::{pick_best_image, resolve_url, score_image_url, ScoredImage};
use super::Heuristics;
use crate::models::LinkPreviewDto;

/// Merge extracted metadata into the response payload.
pub fn assemble_preview(
    document: &RawDocument,
    meta: &ExtractedMetadata,
    heuristics: &Heuristics,
) -> LinkPreviewDto {
    let base = &document.final_url;

    LinkPreviewDto {
        url: base.to_string(),
        title: pick_title(meta, heuristics),
        site_name: meta.og.get("og:site_name").cloned(),
        image_url: pick_image(meta, base, heuristics),
        favicon_url: pick_favicon(&meta.icons, base),
    }
}

/// First non-generic title in priority order, falling back to the first
/// candidate when every one of them is generic.
pub fn pick_title(meta: &ExtractedMetadata, heuristics: &Heuristics) -> Option<String> {
    let candidates: Vec<&String> = meta
        .json_ld_titles
        .iter()
        .chain(meta.og.get("og:title"))
        .chain(meta.twitter.get("twitter:title"))
        .chain(meta.named.get("title"))
        .chain(meta.named.get("description"))
        .chain(meta.title_tag.as_ref())
        .filter(|t| !t.is_empty())
        .collect();

    candidates
        .iter()
        .find(|t| !heuristics.is_generic_title(t))
        .or_else(|| candidates.first())
        .map(|t| t.to_string())
}

/// Choose between the page's declared share image and the best image found
/// elsewhere in the markup.
pub fn pick_image(meta: &ExtractedMetadata, base: &Url, heuristics: &Heuristics) -> Option<String> {
    let meta_image = [
        meta.og.get("og:image"),
        meta.twitter.get("twitter:image"),
        meta.twitter.get("twitter:image:src"),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| resolve_url(v, base));
    let meta_score = meta_image
        .as_deref()
        .map_or(f64::NEG_INFINITY, |u| score_image_url(u, heuristics));

    let json_ld_best = pick_best_image(&meta.json_ld_images, base, heuristics);
    let img_best = pick_best_image(&meta.image_candidates, base, heuristics);
    let best_non_meta = best_of(json_ld_best, img_best);

    tracing::debug!(
        meta_image = ?meta_image,
        meta_score,
        best_non_meta = ?best_non_meta,
        "Choosing preview image"
    );

    match (meta_image, best_non_meta) {
        (Some(meta_url), Some(other)) => {
            let prefer_other = heuristics.is_generic_image(&meta_url)
                || other.score > meta_score + heuristics.image_margin;
            Some(if prefer_other { other.url } else { meta_url })
        }
        (Some(meta_url), None) => Some(meta_url),
        (None, other) => other.map(|o| o.url),
    }
}

// JSON-LD wins ties against <img> candidates.
fn best_of(json_ld: Option<ScoredImage>, img: Option<ScoredImage>) -> Option<ScoredImage> {
    match (json_ld, img) {
        (Some(j), Some(i)) => Some(if j.score >= i.score { j } else { i }),
        (j, i) => j.or(i),
    }
}

/// Prefer an SVG icon, then PNG, then the first resolvable one; default to
/// `/favicon.ico` on the page's origin.
pub fn pick_favicon(icons: &[IconLink], base: &Url) -> Option<String> {
    let resolved: Vec<(&IconLink, String)> = icons
        .iter()
        .filter_map(|icon| {
            let href = resolve_url(icon.href.as_deref()?, base)?;
            Some((icon, href))
        })
        .collect();

    let has_type = |needle: &str| {
        resolved
            .iter()
            .find(|(icon, _)| icon.mime_type.as_deref().unwrap_or("").contains(needle))
    };

    has_type("svg")
        .or_else(|| has_type("png"))
        .or_else(|| resolved.first())
        .map(|(_, href)| href.clone())
        .or_else(|| resolve_url("/favicon.ico", base))
}
