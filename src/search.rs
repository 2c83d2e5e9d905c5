//! # Web Search
//!
//! The [`WebSearch`] trait is how the pipeline gathers source material.
//! [`FirecrawlClient`] implements it with Firecrawl's search endpoint, which
//! runs the search and scrapes every hit to markdown in one call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{require, Config, FIRECRAWL_API_KEY};
use crate::error::{ResearchError, Service, UpstreamError};

/// Default Firecrawl API base URL
const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

/// Default crawl timeout handed to Firecrawl (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Default number of documents per search
pub const DEFAULT_LIMIT: usize = 5;

/// Extra time on top of the crawl timeout before the HTTP call gives up
const HTTP_GRACE_MS: u64 = 10_000;

/// Longest markdown body kept per document when rendering results
const MAX_DOCUMENT_CHARS: usize = 4_000;

/// One search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub timeout_ms: u64,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A crawled page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDocument {
    pub url: String,
    pub title: String,
    pub markdown: String,
}

impl SearchDocument {
    /// Format as markdown for LLM consumption
    pub fn to_markdown(&self) -> String {
        let title = if self.title.trim().is_empty() {
            extract_domain(&self.url).unwrap_or_else(|| "Untitled".to_string())
        } else {
            self.title.trim().to_string()
        };

        format!(
            "### [{}]({})\n\n{}\n",
            title,
            self.url,
            truncate_chars(self.markdown.trim(), MAX_DOCUMENT_CHARS)
        )
    }
}

/// Runs a web search and returns the crawled documents.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, ResearchError>;
}

/// Render search documents into the text stored in `ResearchState::results`.
pub fn render_documents(query: &str, documents: &[SearchDocument]) -> String {
    let mut output = format!("## Search Results for: \"{}\"\n\n", query);

    if documents.is_empty() {
        output.push_str("No results found.\n");
        return output;
    }

    output.push_str(&format!("Found {} results:\n\n", documents.len()));
    for document in documents {
        output.push_str(&document.to_markdown());
        output.push('\n');
    }
    output
}

/// Firecrawl search client.
#[derive(Debug, Clone)]
pub struct FirecrawlClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl FirecrawlClient {
    /// Create a new client with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Build from configuration, failing if the API key is unset.
    pub fn from_config(config: &Config) -> Result<Self, ResearchError> {
        let api_key = require(&config.firecrawl_api_key, FIRECRAWL_API_KEY)?;
        Ok(Self::new(api_key))
    }

    /// Point the client at another server (self-hosted Firecrawl, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn execute(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, UpstreamError> {
        let url = format!("{}/v1/search", self.base_url);
        let body = FirecrawlRequest {
            query: &request.query,
            limit: request.limit,
            timeout: request.timeout_ms,
            scrape_options: ScrapeOptions {
                formats: &["markdown"],
            },
        };

        debug!(url = %url, limit = request.limit, "Sending Firecrawl search");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(http_timeout(request.timeout_ms))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(status, text));
        }

        let parsed: FirecrawlResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if !parsed.success {
            return Err(UpstreamError::Provider(
                parsed
                    .error
                    .unwrap_or_else(|| "search was not successful".to_string()),
            ));
        }
        if let Some(warning) = parsed.warning {
            warn!(warning = %warning, "Firecrawl returned a warning");
        }

        Ok(parsed
            .data
            .into_iter()
            .map(FirecrawlResult::into_document)
            .collect())
    }
}

#[async_trait]
impl WebSearch for FirecrawlClient {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchDocument>, ResearchError> {
        info!(query = %request.query, "Performing web search");

        let documents = self
            .execute(request)
            .await
            .map_err(|e| ResearchError::upstream(Service::WebSearch, e))?;

        if documents.is_empty() {
            warn!(query = %request.query, "No search results found");
        } else {
            info!(query = %request.query, count = documents.len(), "Search completed");
        }
        Ok(documents)
    }
}

/// Request body for Firecrawl search
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FirecrawlRequest<'a> {
    query: &'a str,
    limit: usize,
    timeout: u64,
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: &'static [&'static str],
}

/// Response from Firecrawl search
#[derive(Debug, Deserialize)]
struct FirecrawlResponse {
    success: bool,
    #[serde(default)]
    data: Vec<FirecrawlResult>,
    warning: Option<String>,
    error: Option<String>,
}

/// Individual search hit
#[derive(Debug, Deserialize)]
struct FirecrawlResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
    markdown: Option<String>,
}

impl FirecrawlResult {
    fn into_document(self) -> SearchDocument {
        // Pages that failed to scrape still carry the search snippet.
        let markdown = self
            .markdown
            .filter(|m| !m.trim().is_empty())
            .or(self.description)
            .unwrap_or_default();

        SearchDocument {
            url: self.url,
            title: self.title.unwrap_or_default(),
            markdown,
        }
    }
}

/// Extract the domain name from a URL.
fn extract_domain(url: &str) -> Option<String> {
    url.split("//")
        .nth(1)?
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Cut `text` to at most `max` characters on a char boundary.
/// HTTP deadline for a crawl that may itself take `timeout_ms`.
fn http_timeout(timeout_ms: u64) -> Duration {
    Duration::from_millis(timeout_ms.saturating_add(HTTP_GRACE_MS))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...[truncated]", &text[..idx]),
        None => text.to_string(),
    }
}
