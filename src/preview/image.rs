use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::Heuristics;

// Filename size markers such as `_SX679_` / `_SY879_` (matched on lower-case).
static SX_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"_sx(\d+)_").unwrap());
static SY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"_sy(\d+)_").unwrap());

static WIDTH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&](?:w|width)=(\d+)").unwrap());
static HEIGHT_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&](?:h|height)=(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredImage {
    pub url: String,
    pub score: f64,
}

/// Resolve `value` against `base`. Blank values, `data:` URIs and anything
/// that does not parse yield `None`.
pub fn resolve_url(value: &str, base: &Url) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
    {
        return None;
    }
    base.join(trimmed).ok().map(String::from)
}

/// Additive desirability score for an image URL.
///
/// Logos and sprites are pushed down; explicit size signals in the filename
/// or query string and known large-image hosts push a URL up.
pub fn score_image_url(url: &str, heuristics: &Heuristics) -> f64 {
    let u = url.to_lowercase();
    let mut score = 0.0;

    if u.contains("sprite") || u.contains("logo") {
        score -= 50.0;
    }
    if heuristics
        .boosted_image_paths
        .iter()
        .any(|p| u.contains(p.as_str()))
    {
        score += 40.0;
    }

    score += captured_number(&SX_MARKER, &u).map_or(0.0, |n| (n / 10.0).min(100.0));
    score += captured_number(&SY_MARKER, &u).map_or(0.0, |n| (n / 10.0).min(100.0));
    score += captured_number(&WIDTH_PARAM, &u).map_or(0.0, |n| (n / 20.0).min(50.0));
    score += captured_number(&HEIGHT_PARAM, &u).map_or(0.0, |n| (n / 20.0).min(50.0));

    score
}

fn captured_number(re: &Regex, haystack: &str) -> Option<f64> {
    re.captures(haystack)?.get(1)?.as_str().parse().ok()
}

/// Resolve, de-duplicate and rank `candidates`, returning the top scorer.
/// Equal scores keep their first-seen order.
pub fn pick_best_image<S: AsRef<str>>(
    candidates: &[S],
    base: &Url,
    heuristics: &Heuristics,
) -> Option<ScoredImage> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<ScoredImage> = candidates
        .iter()
        .filter_map(|c| resolve_url(c.as_ref(), base))
        .filter(|u| seen.insert(u.clone()))
        .map(|url| ScoredImage {
            score: score_image_url(&url, heuristics),
            url,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    if tracing::enabled!(tracing::Level::DEBUG) && !ranked.is_empty() {
        let top: Vec<_> = ranked
            .iter()
            .take(10)
            .map(|c| format!("{:.1} {}", c.score, c.url))
            .collect();
        tracing::debug!(candidates = ranked.len(), ?top, "Ranked image candidates");
    }

    ranked.into_iter().next()
}
