//! In-memory fetchers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::errors::ScrapeError;
use crate::fetch::{FetchRequest, FetchResult, Fetcher};

/// A response served by [`FixtureFetcher`].
#[derive(Debug, Clone)]
pub struct CannedResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body.
    pub body: String,
    /// Content type header.
    pub content_type: Option<String>,
}

impl CannedResponse {
    /// A 200 HTML response.
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
            content_type: Some("text/html; charset=utf-8".to_string()),
        }
    }

    /// A 200 JSON response.
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
            content_type: Some("application/json".to_string()),
        }
    }

    /// A response with an arbitrary status.
    #[must_use]
    pub fn status(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            content_type: Some("text/html; charset=utf-8".to_string()),
        }
    }
}

/// A fetcher that serves canned responses keyed by exact URL and records
/// every request. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct FixtureFetcher {
    routes: Mutex<HashMap<String, CannedResponse>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl FixtureFetcher {
    /// Creates a fetcher with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves an HTML document at `url`.
    #[must_use]
    pub fn with_html(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.set_response(url, CannedResponse::html(body));
        self
    }

    /// Serves a JSON document at `url`.
    #[must_use]
    pub fn with_json(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.set_response(url, CannedResponse::json(body));
        self
    }

    /// Serves a bare status at `url`.
    #[must_use]
    pub fn with_status(self, url: impl Into<String>, status_code: u16) -> Self {
        self.set_response(url, CannedResponse::status(status_code, ""));
        self
    }

    /// Sets or replaces the response for `url`.
    pub fn set_response(&self, url: impl Into<String>, response: CannedResponse) {
        self.routes.lock().insert(url.into(), response);
    }

    /// Returns every recorded request.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests made to `url`.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    /// Number of requests made overall.
    #[must_use]
    pub fn total_requests(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forgets recorded requests, keeping routes.
    pub fn reset(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, ScrapeError> {
        self.requests.lock().push(request.clone());

        let response = self
            .routes
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| CannedResponse::status(404, "Not Found"));

        Ok(FetchResult {
            status_code: response.status_code,
            text: response.body,
            final_url: request.url.clone(),
            content_type: response.content_type,
            duration_ms: 0.0,
        })
    }
}

/// A fetcher that panics on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    #[allow(clippy::panic)]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, ScrapeError> {
        panic!("fetcher exploded on {}", request.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_fetcher_routes_and_records() {
        let fetcher = FixtureFetcher::new()
            .with_html("https://a.test/", "<p>a</p>")
            .with_status("https://a.test/gone", 410);

        let ok = fetcher.fetch(&FetchRequest::get("https://a.test/")).await.unwrap();
        assert_eq!(ok.status_code, 200);
        assert!(ok.is_html());
        assert_eq!(ok.text, "<p>a</p>");

        let gone = fetcher.fetch(&FetchRequest::get("https://a.test/gone")).await.unwrap();
        assert_eq!(gone.status_code, 410);

        let unknown = fetcher.fetch(&FetchRequest::get("https://a.test/x")).await.unwrap();
        assert_eq!(unknown.status_code, 404);

        assert_eq!(fetcher.total_requests(), 3);
        assert_eq!(fetcher.request_count("https://a.test/"), 1);

        fetcher.reset();
        assert_eq!(fetcher.total_requests(), 0);
    }
}
