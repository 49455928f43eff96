use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::redirect::{Attempt, Policy};
use reqwest::Client;
use url::Url;

use super::{guard, PreviewError};
use crate::config::PreviewConfig;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// A fetched page: the post-redirect URL and its (possibly truncated) HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub final_url: Url,
    pub html: String,
}

/// Bounded HTML fetcher. Cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_html_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &PreviewConfig) -> Result<Self, PreviewError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent.as_str())
            .redirect(redirect_policy(
                config.max_redirects,
                config.allow_private_hosts,
            ))
            .build()?;

        Ok(Fetcher {
            client,
            max_html_bytes: config.max_html_bytes,
        })
    }

    /// GET `url`, requiring an HTML response no larger than the byte ceiling.
    ///
    /// A declared `content-length` over the ceiling fails before the body is
    /// read; an undeclared one is read up to the ceiling and cut there.
    pub async fn fetch_html(&self, url: &Url) -> Result<RawDocument, PreviewError> {
        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await?;

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return Err(PreviewError::NotHtml);
        }

        if let Some(len) = response.content_length() {
            if len > self.max_html_bytes as u64 {
                return Err(PreviewError::TooLarge);
            }
        }

        let final_url = response.url().clone();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let remaining = self.max_html_bytes - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                tracing::debug!(url = %final_url, limit = self.max_html_bytes, "Truncated HTML body");
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawDocument {
            final_url,
            html: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// Follow at most `max` redirects, re-checking every hop against the guard.
fn redirect_policy(max: usize, allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt: Attempt| {
        if attempt.previous().len() > max {
            return attempt.error("too many redirects");
        }
        let is_http = matches!(attempt.url().scheme(), "http" | "https");
        if !is_http {
            return attempt.error(PreviewError::UnsupportedScheme);
        }
        if !allow_private_hosts {
            if let Err(e) = guard::check_host(attempt.url()) {
                tracing::warn!(url = %attempt.url(), error = %e, "Refusing link preview redirect");
                return attempt.error(e);
            }
        }
        attempt.follow()
    })
}
