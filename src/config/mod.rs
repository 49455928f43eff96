use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::preview::{
    Heuristics, DEFAULT_BOOSTED_IMAGE_PATHS, DEFAULT_GENERIC_IMAGE_PATTERNS,
    DEFAULT_GENERIC_TITLES, DEFAULT_IMAGE_MARGIN,
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_MAX_HTML_BYTES: usize = 1_000_000;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;
pub const DEFAULT_USER_AGENT: &str = "LinkSyncPreviewBot/0.1 (+https://example.invalid)";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{name} contains an invalid pattern: {source}")]
    Pattern {
        name: &'static str,
        source: regex::Error,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub preview: PreviewConfig,
}

/// Limits and heuristics for the link preview pipeline.
#[derive(Clone, Debug)]
pub struct PreviewConfig {
    pub fetch_timeout: Duration,
    pub max_html_bytes: usize,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Skip hostname/IP checks. Only meant for local development and tests.
    pub allow_private_hosts: bool,
    /// Resolve domain hosts and reject private answers before fetching.
    pub resolve_hosts: bool,
    pub heuristics: Heuristics,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_html_bytes: DEFAULT_MAX_HTML_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_hosts: false,
            resolve_hosts: true,
            heuristics: Heuristics::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let generic_titles =
            list_var("LINK_PREVIEW_GENERIC_TITLES", ',', DEFAULT_GENERIC_TITLES);
        let generic_image_patterns = list_var(
            "LINK_PREVIEW_GENERIC_IMAGE_PATTERNS",
            ';',
            DEFAULT_GENERIC_IMAGE_PATTERNS,
        );
        let boosted_image_paths = list_var(
            "LINK_PREVIEW_BOOSTED_IMAGE_PATHS",
            ',',
            DEFAULT_BOOSTED_IMAGE_PATHS,
        );
        let heuristics = Heuristics::new(
            &generic_titles,
            &generic_image_patterns,
            &boosted_image_paths,
            parse_var("LINK_PREVIEW_IMAGE_MARGIN", DEFAULT_IMAGE_MARGIN)?,
        )
        .map_err(|source| ConfigError::Pattern {
            name: "LINK_PREVIEW_GENERIC_IMAGE_PATTERNS",
            source,
        })?;

        let preview = PreviewConfig {
            fetch_timeout: Duration::from_secs(parse_var(
                "LINK_PREVIEW_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT.as_secs(),
            )?),
            max_html_bytes: parse_var("LINK_PREVIEW_MAX_HTML_BYTES", DEFAULT_MAX_HTML_BYTES)?,
            max_redirects: parse_var("LINK_PREVIEW_MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS)?,
            user_agent: env::var("LINK_PREVIEW_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            allow_private_hosts: parse_var("LINK_PREVIEW_ALLOW_PRIVATE_HOSTS", false)?,
            resolve_hosts: parse_var("LINK_PREVIEW_RESOLVE_HOSTS", true)?,
            heuristics,
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 8080)?,
            is_dev: env::var("APP_ENV").as_deref() != Ok("production"),
            allowed_origins: list_var("ALLOWED_ORIGINS", ',', &[]),
            rate_limit_per_minute: parse_var("RATE_LIMIT_PER_MINUTE", 60)?,
            preview,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Read `name` as `T`, using `default` when unset or blank.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

/// Read `name` as a `sep`-separated list, dropping blank entries.
fn list_var(name: &str, sep: char, default: &[&str]) -> Vec<String> {
    match env::var(name) {
        Ok(value) => split_list(&value, sep),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn split_list(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
