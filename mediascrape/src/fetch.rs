//! HTTP fetching for the extractors.
//!
//! Extractors depend on the [`Fetcher`] trait only, so tests can replace the
//! network with canned documents.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::errors::ScrapeError;

/// A single outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,
    /// Request headers, in insertion order.
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// Creates a request without headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Looks up a header value, ignoring case.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body as text.
    pub text: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// Content type from headers.
    pub content_type: Option<String>,
    /// Time taken to fetch in milliseconds.
    pub duration_ms: f64,
}

impl FetchResult {
    /// Whether the response is HTML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
    }

    /// Whether the fetch was successful (2xx status).
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> Result<serde_json::Value, ScrapeError> {
        Ok(serde_json::from_str(&self.text)?)
    }
}

/// Protocol for HTTP fetching.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Performs a GET request.
    ///
    /// Any HTTP status is returned as a [`FetchResult`]; only transport
    /// failures produce an error.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, ScrapeError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    extra_headers: HashMap<String, String>,
}

impl HttpFetcher {
    /// Builds a fetcher from configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ScrapeError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            extra_headers: config.headers.clone(),
        })
    }

    /// Headers sent for `request`: its own, plus configured extras it does
    /// not already set.
    fn headers_for<'a>(&'a self, request: &'a FetchRequest) -> Vec<(&'a str, &'a str)> {
        let extras = self
            .extra_headers
            .iter()
            .filter(|(key, _)| request.header(key).is_none())
            .map(|(key, value)| (key.as_str(), value.as_str()));

        request
            .headers
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .chain(extras)
            .collect()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, ScrapeError> {
        let start = Instant::now();
        let mut builder = self.client.get(&request.url);
        for (key, value) in self.headers_for(request) {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Request failed");
            ScrapeError::from(e)
        })?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = response.text().await?;
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            url = %request.url,
            status = status_code,
            duration_ms,
            bytes = text.len(),
            "Fetched"
        );

        Ok(FetchResult {
            status_code,
            text,
            final_url,
            content_type,
            duration_ms,
        })
    }
}

/// Escapes a value for interpolation into a URL path segment or query.
#[must_use]
pub fn escape(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status_code: u16, content_type: Option<&str>) -> FetchResult {
        FetchResult {
            status_code,
            text: String::new(),
            final_url: "https://example.com".to_string(),
            content_type: content_type.map(String::from),
            duration_ms: 0.0,
        }
    }

    #[test]
    fn test_fetch_result_is_html() {
        assert!(result(200, Some("text/html; charset=utf-8")).is_html());
        assert!(!result(200, Some("application/json")).is_html());
        assert!(!result(200, None).is_html());
    }

    #[test]
    fn test_fetch_result_is_success() {
        assert!(result(200, None).is_success());
        assert!(!result(404, None).is_success());
        assert!(!result(301, None).is_success());
    }

    #[test]
    fn test_fetch_result_json() {
        let mut ok = result(200, Some("application/json"));
        ok.text = r#"{"title": "Dune"}"#.to_string();
        assert_eq!(ok.json().unwrap()["title"], "Dune");

        let mut broken = result(200, Some("application/json"));
        broken.text = "<html>".to_string();
        assert!(matches!(broken.json(), Err(ScrapeError::Decode(_))));
    }

    #[test]
    fn test_request_headers() {
        let request = FetchRequest::get("https://example.com")
            .with_header("Accept", "text/html")
            .with_header("Accept-Language", "sv-SE,en;q=0.5");

        assert_eq!(request.header("accept-language"), Some("sv-SE,en;q=0.5"));
        assert_eq!(request.header("User-Agent"), None);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("the shawshank redemption"), "the%20shawshank%20redemption");
        assert_eq!(escape("tt0111161"), "tt0111161");
        assert_eq!(escape("a/b?c"), "a%2Fb%3Fc");
    }

    #[test]
    fn test_http_fetcher_builds() {
        let fetcher = HttpFetcher::new(&FetchConfig::new().with_header("DNT", "1")).unwrap();
        assert_eq!(fetcher.extra_headers.get("DNT"), Some(&"1".to_string()));
    }

    #[test]
    fn test_request_headers_override_configured_extras() {
        let config = FetchConfig::new()
            .with_header("user-agent", "configured/1.0")
            .with_header("DNT", "1");
        let fetcher = HttpFetcher::new(&config).unwrap();
        let request = FetchRequest::get("https://example.com")
            .with_header("User-Agent", "Mozilla/5.0")
            .with_header("Accept", "text/html");

        let mut headers = fetcher.headers_for(&request);
        headers.sort_unstable();

        assert_eq!(
            headers,
            vec![("Accept", "text/html"), ("DNT", "1"), ("User-Agent", "Mozilla/5.0")]
        );
    }
}
