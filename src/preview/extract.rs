//! Tag-level HTML scanning for preview metadata.
//!
//! No DOM parser: each tag of interest is matched on its own and its
//! attributes are read with a quoting-tolerant pattern. Malformed or unclosed
//! markup elsewhere in the page never aborts extraction.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<meta\s+[^>]*>").unwrap());

static LINK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<link\s+[^>]*>").unwrap());

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\s+[^>]*>").unwrap());

static JSON_LD_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
    )
    .unwrap()
});

static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

// name = "double" | 'single' | unquoted
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:-][A-Za-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A `<link rel="...icon...">` entry, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconLink {
    pub rel: Option<String>,
    pub href: Option<String>,
    pub sizes: Option<String>,
    pub mime_type: Option<String>,
}

/// Everything the assembler can pick from. Map keys are lower-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    /// `<meta property="og:*">`
    pub og: HashMap<String, String>,
    /// `<meta name="twitter:*">`
    pub twitter: HashMap<String, String>,
    /// Any other `<meta name="...">`, e.g. `title` or `description`.
    pub named: HashMap<String, String>,
    pub icons: Vec<IconLink>,
    /// Images of JSON-LD `Product` objects.
    pub json_ld_images: Vec<String>,
    /// Names of JSON-LD `Product` objects.
    pub json_ld_titles: Vec<String>,
    /// Raw, unresolved image URLs found on `<img>` tags.
    pub image_candidates: Vec<String>,
    pub title_tag: Option<String>,
}

/// Scan `html` for preview metadata. Never fails; unreadable sources are skipped.
pub fn extract_metadata(html: &str) -> ExtractedMetadata {
    let mut meta = ExtractedMetadata::default();

    for tag in META_TAG.find_iter(html) {
        let attrs = parse_tag_attributes(tag.as_str());
        let Some(content) = attrs.get("content").filter(|c| !c.is_empty()) else {
            continue;
        };

        let property = attrs.get("property").map(|p| p.to_lowercase());
        let name = attrs.get("name").map(|n| n.to_lowercase());

        match (property, name) {
            (Some(p), _) if p.starts_with("og:") => {
                meta.og.insert(p, content.clone());
            }
            (_, Some(n)) if n.starts_with("twitter:") => {
                meta.twitter.insert(n, content.clone());
            }
            (_, Some(n)) => {
                meta.named.insert(n, content.clone());
            }
            _ => {}
        }
    }

    for tag in LINK_TAG.find_iter(html) {
        let mut attrs = parse_tag_attributes(tag.as_str());
        let is_icon = attrs
            .get("rel")
            .is_some_and(|rel| rel.to_lowercase().contains("icon"));
        if is_icon {
            meta.icons.push(IconLink {
                rel: attrs.remove("rel"),
                href: attrs.remove("href"),
                sizes: attrs.remove("sizes"),
                mime_type: attrs.remove("type"),
            });
        }
    }

    for caps in JSON_LD_SCRIPT.captures_iter(html) {
        let raw = caps.get(1).map_or("", |m| m.as_str()).trim();
        if raw.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => collect_json_ld_products(
                &parsed,
                &mut meta.json_ld_titles,
                &mut meta.json_ld_images,
            ),
            Err(e) => tracing::debug!(error = %e, "Skipping malformed JSON-LD block"),
        }
    }

    for tag in IMG_TAG.find_iter(html) {
        collect_img_candidates(
            &parse_tag_attributes(tag.as_str()),
            &mut meta.image_candidates,
        );
    }

    meta.title_tag = TITLE_TAG
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| collapse_whitespace(&decode_html_entities(m.as_str())))
        .filter(|t| !t.is_empty());

    meta
}

/// Read `name=value` pairs from a single tag. Names are lower-cased, values
/// trimmed and entity-decoded; a repeated name keeps its last value.
pub fn parse_tag_attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .map(|caps| {
            let key = caps[1].to_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (key, decode_html_entities(value.trim()))
        })
        .collect()
}

fn collect_img_candidates(attrs: &HashMap<String, String>, out: &mut Vec<String>) {
    // Map of image URL -> [width, height]; every key is a candidate.
    if let Some(dynamic) = attrs.get("data-a-dynamic-image").filter(|d| !d.is_empty()) {
        match serde_json::from_str::<Value>(dynamic) {
            Ok(Value::Object(map)) => out.extend(map.keys().cloned()),
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Skipping malformed data-a-dynamic-image"),
        }
    }

    for key in ["data-old-hires", "src"] {
        if let Some(v) = attrs.get(key).filter(|v| !v.is_empty()) {
            out.push(v.clone());
        }
    }

    if let Some(best) = attrs.get("srcset").and_then(|s| widest_srcset_entry(s)) {
        out.push(best.to_string());
    }
}

/// Pick the URL with the largest `Nw` descriptor; the first one wins on ties.
pub fn widest_srcset_entry(srcset: &str) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;

    for part in srcset.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut pieces = part.split_whitespace();
        let Some(url) = pieces.next() else {
            continue;
        };
        let width = pieces
            .next()
            .and_then(|d| d.strip_suffix('w'))
            .and_then(|n| n.parse::<f64>().ok())
            .filter(|w| w.is_finite());
        let Some(width) = width else {
            continue;
        };
        if best.map_or(true, |(_, w)| width > w) {
            best = Some((url, width));
        }
    }

    best.map(|(url, _)| url)
}

fn collect_json_ld_products(node: &Value, titles: &mut Vec<String>, images: &mut Vec<String>) {
    match node {
        Value::Array(items) => {
            for item in items {
                collect_json_ld_products(item, titles, images);
            }
        }
        Value::Object(obj) => {
            let is_product = match obj.get("@type") {
                Some(Value::Array(types)) => types.iter().any(is_product_type),
                Some(t) => is_product_type(t),
                None => false,
            };

            if is_product {
                if let Some(name) = obj.get("name").and_then(Value::as_str) {
                    let name = name.trim();
                    if !name.is_empty() {
                        titles.push(name.to_string());
                    }
                }
                match obj.get("image") {
                    Some(Value::Array(items)) => {
                        items.iter().for_each(|item| push_json_ld_image(item, images))
                    }
                    Some(image) => push_json_ld_image(image, images),
                    None => {}
                }
            }

            for value in obj.values() {
                collect_json_ld_products(value, titles, images);
            }
        }
        _ => {}
    }
}

fn is_product_type(t: &Value) -> bool {
    match t {
        Value::String(s) => s.eq_ignore_ascii_case("product"),
        _ => false,
    }
}

// "https://..." or { "url": "https://..." }
fn push_json_ld_image(value: &Value, images: &mut Vec<String>) {
    let url = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str),
        _ => None,
    };
    if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
        images.push(url.to_string());
    }
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Decode the handful of entities that show up in attribute values and titles.
fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&#x2F;", "/")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
