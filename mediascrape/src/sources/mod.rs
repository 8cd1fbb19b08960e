//! Site extractors.
//!
//! Each source owns its fetcher handle and caches, and exposes the two
//! operation shapes lookups are built from: search (query to candidate
//! identifiers) and fetch-by-id (identifier to details).

mod amazon;
mod imdb;
mod openlibrary;

pub use amazon::{parse_product_page, parse_search_page, AmazonSource};
pub use imdb::{parse_search_results, parse_title_page, ImdbSource};
pub use openlibrary::{merge_book, parse_search_response, OpenLibrarySource};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::errors::ScrapeError;
use crate::fetch::{FetchRequest, FetchResult, Fetcher};
use crate::models::SearchHit;

/// A source that can find items by title and fetch them by identifier.
#[async_trait]
pub trait TitleSource: Send + Sync {
    /// Details returned by [`TitleSource::fetch_by_id`].
    type Details: Send;

    /// Source name used in logs.
    fn name(&self) -> &'static str;

    /// Searches by title, best match first.
    async fn search_by_title(
        &self,
        title: &str,
        locale: Option<&str>,
    ) -> Result<Vec<SearchHit>, ScrapeError>;

    /// Fetches the item with the given identifier.
    async fn fetch_by_id(
        &self,
        id: &str,
        locale: Option<&str>,
    ) -> Result<Self::Details, ScrapeError>;
}

/// Searches by title and fetches the first hit.
pub async fn search_then_fetch<S: TitleSource + ?Sized>(
    source: &S,
    title: &str,
    locale: Option<&str>,
) -> Result<S::Details, ScrapeError> {
    let hits = source.search_by_title(title, locale).await?;
    let Some(first) = hits.into_iter().next() else {
        return Err(ScrapeError::not_found(format!("No results for '{title}'")));
    };
    debug!(source = source.name(), id = %first.id, title = %first.title, "Using first search hit");
    source.fetch_by_id(&first.id, locale).await
}

/// Builds a browser-like request for an HTML source.
pub(crate) fn html_request(config: &FetchConfig, url: String, locale: Option<&str>) -> FetchRequest {
    FetchRequest::get(url)
        .with_header("Accept", config.accept.as_str())
        .with_header("Accept-Language", config.accept_language(locale))
        .with_header("User-Agent", config.user_agent.as_str())
}

/// Fetches and requires a 2xx status.
///
/// Server errors become [`ScrapeError::UpstreamUnavailable`]; every other
/// non-success status is a miss described by `missing`.
pub(crate) async fn fetch_success(
    fetcher: &dyn Fetcher,
    source: &'static str,
    request: &FetchRequest,
    missing: impl FnOnce() -> String + Send,
) -> Result<FetchResult, ScrapeError> {
    let result = fetcher.fetch(request).await?;
    if result.is_success() {
        return Ok(result);
    }

    warn!(
        source,
        url = %request.url,
        status = result.status_code,
        "Upstream returned non-success status"
    );
    if result.status_code >= 500 {
        Err(ScrapeError::upstream(result.status_code, request.url.clone()))
    } else {
        Err(ScrapeError::not_found(missing()))
    }
}

/// Trims and drops empty strings.
pub(crate) fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}
