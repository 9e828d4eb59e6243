//! HTTP page fetcher.
//!
//! [`HttpFetcher`] downloads a page with a fixed user agent and timeout and
//! hands the body to [`picc_core::extract`]. Every failure, whether network,
//! non-2xx status, or the content-length quality gate, comes back as a
//! [`FetchResult`] with `success = false`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde::Serialize;
use tracing::debug;

use picc_core::extract::extract_page;

use crate::config::ScraperConfig;

pub const CONTENT_TOO_SHORT: &str = "Content too short or could not be extracted";

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub success: bool,
    pub url: String,
    pub title: String,
    pub content: String,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn ok(url: &str, title: String, content: String) -> Self {
        Self {
            success: true,
            url: url.to_string(),
            title,
            content,
            error: None,
        }
    }

    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Anything that can turn a URL into extracted page text.
///
/// An `Err` means the fetcher itself broke, as opposed to the page being
/// unreachable or too thin, which is a `FetchResult` with `success = false`.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_and_extract(&self, url: &str) -> Result<FetchResult>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    min_section_chars: usize,
    min_content_chars: usize,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-AU,en;q=0.8"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            min_section_chars: config.min_section_chars,
            min_content_chars: config.min_content_chars,
        })
    }

    async fn fetch_html(&self, url: &str) -> std::result::Result<String, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Result<FetchResult> {
        let html = match self.fetch_html(url).await {
            Ok(html) => html,
            Err(e) => {
                debug!(url, error = %e, "fetch failed");
                return Ok(FetchResult::failed(url, e));
            }
        };

        let page = extract_page(&html, self.min_section_chars);
        if page.content.chars().count() < self.min_content_chars {
            return Ok(FetchResult::failed(url, CONTENT_TOO_SHORT));
        }

        Ok(FetchResult::ok(url, page.title, page.content))
    }
}
