//! Link preview pipeline: guard → fetch → extract → select image → assemble.
//!
//! Every stage is per-request; the [`Previewer`] only holds the immutable
//! configuration and a pooled HTTP client.

pub mod assemble;
pub mod extract;
pub mod fetch;
pub mod guard;
pub mod image;

use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use url::{Host, Url};

use crate::config::PreviewConfig;
use crate::models::LinkPreviewDto;

pub use assemble::assemble_preview;
pub use extract::extract_metadata;
pub use fetch::{Fetcher, RawDocument};

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Only http/https URLs are supported")]
    UnsupportedScheme,

    #[error("Blocked hostname")]
    BlockedHost,

    #[error("Blocked IP")]
    BlockedIp,

    #[error("URL did not return HTML")]
    NotHtml,

    #[error("HTML response too large")]
    TooLarge,

    #[error("Preview request timed out")]
    Timeout,

    #[error("Could not resolve host: {0}")]
    Resolve(std::io::Error),

    /// A redirect hop was refused; carries the refusal reason.
    #[error("{0}")]
    RedirectRefused(String),

    #[error("{0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for PreviewError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return PreviewError::Timeout;
        }
        if e.is_redirect() {
            if let Some(reason) = std::error::Error::source(&e) {
                return PreviewError::RedirectRefused(reason.to_string());
            }
        }
        PreviewError::Request(e)
    }
}

/// Site-specific denylists and boosts used when ranking titles and images.
///
/// The defaults cover a commerce site whose `og:title` and `og:image` are
/// brand placeholders rather than page content.
#[derive(Debug, Clone)]
pub struct Heuristics {
    /// Titles (compared case-insensitively after trimming) that never describe a page.
    pub generic_titles: Vec<String>,
    /// Meta image URLs matching any of these are treated as placeholders.
    pub generic_image_patterns: Vec<Regex>,
    /// URL fragments of hosts known to serve large product images.
    pub boosted_image_paths: Vec<String>,
    /// How far a non-meta image must out-score the meta image to replace it.
    pub image_margin: f64,
}

pub const DEFAULT_GENERIC_TITLES: &[&str] = &["amazon.com"];
pub const DEFAULT_GENERIC_IMAGE_PATTERNS: &[&str] = &[r"/share-icons/(?:.*/)?amazon\.png$", "logo"];
pub const DEFAULT_BOOSTED_IMAGE_PATHS: &[&str] = &["m.media-amazon.com/images/i/"];
pub const DEFAULT_IMAGE_MARGIN: f64 = 20.0;

impl Heuristics {
    /// Build from string lists; image patterns are compiled case-insensitively.
    pub fn new<S: AsRef<str>>(
        generic_titles: &[S],
        generic_image_patterns: &[S],
        boosted_image_paths: &[S],
        image_margin: f64,
    ) -> Result<Self, regex::Error> {
        let generic_image_patterns = generic_image_patterns
            .iter()
            .map(|p| RegexBuilder::new(p.as_ref()).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Heuristics {
            generic_titles: generic_titles
                .iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .collect(),
            generic_image_patterns,
            boosted_image_paths: boosted_image_paths
                .iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
            image_margin,
        })
    }

    pub fn is_generic_title(&self, title: &str) -> bool {
        let t = title.trim().to_lowercase();
        self.generic_titles.iter().any(|g| *g == t)
    }

    pub fn is_generic_image(&self, url: &str) -> bool {
        self.generic_image_patterns.iter().any(|re| re.is_match(url))
    }
}

impl Default for Heuristics {
    fn default() -> Self {
        Heuristics::new(
            DEFAULT_GENERIC_TITLES,
            DEFAULT_GENERIC_IMAGE_PATTERNS,
            DEFAULT_BOOSTED_IMAGE_PATHS,
            DEFAULT_IMAGE_MARGIN,
        )
        .expect("default generic image patterns are valid regexes")
    }
}

/// Runs the full preview pipeline for one user-supplied URL.
#[derive(Clone)]
pub struct Previewer {
    config: Arc<PreviewConfig>,
    fetcher: Fetcher,
}

impl Previewer {
    pub fn new(config: PreviewConfig) -> Result<Self, PreviewError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Previewer {
            config: Arc::new(config),
            fetcher,
        })
    }

    pub async fn preview(&self, raw_url: &str) -> Result<LinkPreviewDto, PreviewError> {
        let target = guard::validate_target(raw_url, self.config.allow_private_hosts)?;

        if self.config.resolve_hosts && !self.config.allow_private_hosts {
            check_resolved_addrs(&target, self.config.fetch_timeout).await?;
        }

        let document = self.fetcher.fetch_html(&target).await.map_err(|e| {
            tracing::warn!(error = %e, url = %target, "Failed to fetch URL for link preview");
            e
        })?;

        let metadata = extract_metadata(&document.html);
        tracing::debug!(
            url = %document.final_url,
            img_candidates = metadata.image_candidates.len(),
            json_ld_titles = metadata.json_ld_titles.len(),
            json_ld_images = metadata.json_ld_images.len(),
            icons = metadata.icons.len(),
            "Extracted link preview metadata"
        );

        Ok(assemble_preview(&document, &metadata, &self.config.heuristics))
    }
}

/// Resolve a domain host and refuse it if any address is private.
///
/// The lookup shares the fetch timeout. The connection made afterwards
/// resolves again, so a rebinding DNS server can still swap the answer in
/// between.
async fn check_resolved_addrs(url: &Url, timeout: Duration) -> Result<(), PreviewError> {
    let Some(Host::Domain(domain)) = url.host() else {
        return Ok(());
    };
    let port = url.port_or_known_default().unwrap_or(80);

    let addrs = tokio::time::timeout(timeout, tokio::net::lookup_host((domain, port)))
        .await
        .map_err(|_| PreviewError::Timeout)?
        .map_err(PreviewError::Resolve)?;

    for addr in addrs {
        if guard::is_private_ip(addr.ip()) {
            tracing::warn!(host = %domain, ip = %addr.ip(), "Link preview host resolves to a private address");
            return Err(PreviewError::BlockedIp);
        }
    }
    Ok(())
}
