//! OpenLibrary ISBN lookup and title search.
//!
//! A book is assembled from up to three kinds of records: the edition found
//! by ISBN, its work, and the work's authors. Work and author records are
//! fetched one after another and any of them failing only empties the
//! fields it would have filled.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{fetch_success, non_empty, TitleSource};
use crate::cache::{memoize, CacheKey, SharedCache, TtlCache};
use crate::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::fetch::{escape, FetchRequest, Fetcher};
use crate::models::{BookDetails, SearchHit};

const SOURCE: &str = "openlibrary";
const SEARCH_LIMIT: usize = 10;

fn string_field(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| non_empty(s.to_string()))
}

fn string_list(record: &Value, key: &str) -> Option<Vec<String>> {
    record.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect()
    })
}

/// Author record keys referenced by the work, or by the edition when the
/// work lists none.
fn author_keys(edition: &Value, work: Option<&Value>) -> Vec<String> {
    let listed = |record: &Value| {
        record
            .get("authors")
            .and_then(Value::as_array)
            .filter(|authors| !authors.is_empty())
            .cloned()
    };
    let authors = work.and_then(listed).or_else(|| listed(edition)).unwrap_or_default();

    authors
        .iter()
        .filter_map(|entry| {
            entry
                .pointer("/author/key")
                .or_else(|| entry.get("key"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .collect()
}

/// Display name of an author record.
fn author_name(record: &Value) -> Option<String> {
    string_field(record, "personal_name").or_else(|| string_field(record, "name"))
}

/// Merges an edition with its work and resolved author names.
///
/// Title, subtitle and subjects come from the work when it has them and
/// from the edition otherwise. Identifiers, dates, page count and
/// publishers are edition-level only.
#[must_use]
pub fn merge_book(
    isbn: &str,
    image_url: String,
    edition: &Value,
    work: Option<&Value>,
    authors: Vec<String>,
) -> BookDetails {
    let from_work = |key: &str| work.and_then(|w| string_field(w, key));
    let subjects = work
        .and_then(|w| string_list(w, "subjects"))
        .filter(|subjects| !subjects.is_empty())
        .or_else(|| string_list(edition, "subjects"))
        .unwrap_or_default();

    BookDetails {
        isbn: isbn.to_string(),
        image_url,
        title: from_work("title").or_else(|| string_field(edition, "title")),
        subtitle: from_work("subtitle").or_else(|| string_field(edition, "subtitle")),
        isbn_10: string_list(edition, "isbn_10"),
        isbn_13: string_list(edition, "isbn_13"),
        authors,
        publish_date: string_field(edition, "publish_date"),
        number_of_pages: edition.get("number_of_pages").and_then(Value::as_i64),
        publishers: string_list(edition, "publishers").unwrap_or_default(),
        subjects,
    }
}

/// Turns a `search.json` response into hits keyed by ISBN.
///
/// Documents without an ISBN cannot be looked up and are skipped.
pub fn parse_search_response(response: &Value) -> Result<Vec<SearchHit>, ScrapeError> {
    let docs = response
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| ScrapeError::not_found("Unexpected search response"))?;

    Ok(docs
        .iter()
        .filter_map(|doc| {
            let isbn = doc.get("isbn")?.as_array()?.first()?.as_str()?;
            let title = string_field(doc, "title").unwrap_or_default();
            Some(SearchHit::new(isbn, title))
        })
        .collect())
}

fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// OpenLibrary extractor.
pub struct OpenLibrarySource {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
    covers_url: String,
    user_agent: String,
    book_cache: SharedCache<BookDetails>,
    record_cache: SharedCache<Option<Value>>,
    search_cache: SharedCache<Vec<SearchHit>>,
}

impl OpenLibrarySource {
    /// Creates an extractor with its own caches.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            base_url: config
                .sources
                .openlibrary_base_url
                .trim_end_matches('/')
                .to_string(),
            covers_url: config
                .sources
                .openlibrary_covers_url
                .trim_end_matches('/')
                .to_string(),
            user_agent: config.sources.openlibrary_user_agent(),
            book_cache: TtlCache::shared("openlibrary.isbn", &config.cache),
            record_cache: TtlCache::shared("openlibrary.record", &config.cache),
            search_cache: TtlCache::shared("openlibrary.search", &config.cache),
        }
    }

    /// Replaces the caches.
    #[must_use]
    pub fn with_caches(
        mut self,
        book_cache: SharedCache<BookDetails>,
        record_cache: SharedCache<Option<Value>>,
        search_cache: SharedCache<Vec<SearchHit>>,
    ) -> Self {
        self.book_cache = book_cache;
        self.record_cache = record_cache;
        self.search_cache = search_cache;
        self
    }

    fn request(&self, url: String) -> FetchRequest {
        FetchRequest::get(url)
            .with_header("Accept", "application/json")
            .with_header("User-Agent", self.user_agent.as_str())
    }

    /// Large cover image for an ISBN.
    #[must_use]
    pub fn cover_url(&self, isbn: &str) -> String {
        format!("{}/b/isbn/{}-L.jpg", self.covers_url, escape(isbn))
    }

    /// Fetches a record by key, e.g. `/works/OL166894W`.
    ///
    /// Any failure yields `None`. Misses are cached, transport failures are not.
    pub async fn fetch_record(&self, key: &str) -> Option<Value> {
        let cache_key = CacheKey::new("openlibrary.record", [key]);
        let result = memoize(self.record_cache.as_ref(), cache_key, move || async move {
            let request = self.request(format!("{}{}.json", self.base_url, key));
            let response = self.fetcher.fetch(&request).await?;
            if !response.is_success() {
                debug!(source = SOURCE, key, status = response.status_code, "Record missing");
                return Ok(None);
            }
            Ok(response.json().ok().filter(Value::is_object))
        })
        .await;

        match result {
            Ok(record) => record,
            Err(err) => {
                warn!(source = SOURCE, key, error = %err, "Record fetch failed");
                None
            }
        }
    }

    /// Looks up a book by ISBN.
    pub async fn fetch_by_isbn(&self, isbn: &str) -> Result<BookDetails, ScrapeError> {
        let isbn = normalize_isbn(isbn);
        let key = CacheKey::new("openlibrary.isbn", [isbn.as_str()]);
        let isbn = isbn.as_str();

        memoize(self.book_cache.as_ref(), key, move || async move {
            info!(source = SOURCE, isbn, "Fetching edition");
            let request = self.request(format!("{}/isbn/{}.json", self.base_url, escape(isbn)));
            let response = fetch_success(self.fetcher.as_ref(), SOURCE, &request, || {
                "ISBN not found".to_string()
            })
            .await?;
            let edition = response
                .json()
                .ok()
                .filter(Value::is_object)
                .ok_or_else(|| ScrapeError::not_found("ISBN not found"))?;

            let work_key = edition
                .pointer("/works/0/key")
                .and_then(Value::as_str)
                .map(String::from);
            let work = match work_key {
                Some(key) => self.fetch_record(&key).await,
                None => None,
            };

            let mut authors = Vec::new();
            for key in author_keys(&edition, work.as_ref()) {
                if let Some(name) = self.fetch_record(&key).await.as_ref().and_then(author_name) {
                    authors.push(name);
                }
            }

            Ok(merge_book(
                isbn,
                self.cover_url(isbn),
                &edition,
                work.as_ref(),
                authors,
            ))
        })
        .await
    }

    /// Searches books by title, best match first.
    pub async fn search_by_title(&self, title: &str) -> Result<Vec<SearchHit>, ScrapeError> {
        let key = CacheKey::folded("openlibrary.search", [title]);

        memoize(self.search_cache.as_ref(), key, move || async move {
            info!(source = SOURCE, title, "Searching books");
            let url = format!(
                "{}/search.json?q={}&fields=key,title,isbn&limit={SEARCH_LIMIT}",
                self.base_url,
                escape(title)
            );
            let request = self.request(url);
            let response = fetch_success(self.fetcher.as_ref(), SOURCE, &request, || {
                format!("No results for '{title}'")
            })
            .await?;
            parse_search_response(&response.json()?)
        })
        .await
    }
}

impl std::fmt::Debug for OpenLibrarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenLibrarySource")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("cached_books", &self.book_cache.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TitleSource for OpenLibrarySource {
    type Details = BookDetails;

    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search_by_title(
        &self,
        title: &str,
        _locale: Option<&str>,
    ) -> Result<Vec<SearchHit>, ScrapeError> {
        Self::search_by_title(self, title).await
    }

    async fn fetch_by_id(&self, id: &str, _locale: Option<&str>) -> Result<BookDetails, ScrapeError> {
        self.fetch_by_isbn(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{self, urls, FixtureFetcher};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const COVER: &str = "https://covers.openlibrary.org/b/isbn/9780140449136-L.jpg";

    fn source(fetcher: Arc<FixtureFetcher>) -> OpenLibrarySource {
        OpenLibrarySource::new(fetcher, &testing::test_config())
    }

    #[test]
    fn test_merge_prefers_work_fields() {
        let edition: Value = serde_json::from_str(testing::OPENLIBRARY_EDITION).unwrap();
        let work: Value = serde_json::from_str(testing::OPENLIBRARY_WORK).unwrap();

        let book = merge_book(
            "9780140449136",
            COVER.to_string(),
            &edition,
            Some(&work),
            vec!["Fyodor Dostoyevsky".to_string()],
        );

        assert_eq!(
            book,
            BookDetails {
                isbn: "9780140449136".to_string(),
                image_url: COVER.to_string(),
                title: Some("Crime and Punishment".to_string()),
                subtitle: None,
                isbn_10: Some(vec!["0140449132".to_string()]),
                isbn_13: Some(vec!["9780140449136".to_string()]),
                authors: vec!["Fyodor Dostoyevsky".to_string()],
                publish_date: Some("2003".to_string()),
                number_of_pages: Some(671),
                publishers: vec!["Penguin Books".to_string()],
                subjects: vec![
                    "Psychological fiction".to_string(),
                    "Crime".to_string(),
                    "Saint Petersburg (Russia)".to_string(),
                ],
            }
        );
    }

    #[test]
    fn test_merge_falls_back_to_edition() {
        let edition = json!({
            "title": "Edition Title",
            "subtitle": "A Novel",
            "subjects": ["Russian fiction"]
        });
        let work = json!({"subjects": []});

        let book = merge_book("1", String::new(), &edition, Some(&work), vec![]);

        assert_eq!(book.title.as_deref(), Some("Edition Title"));
        assert_eq!(book.subtitle.as_deref(), Some("A Novel"));
        assert_eq!(book.subjects, vec!["Russian fiction".to_string()]);
        assert_eq!(book.isbn_10, None);
        assert_eq!(book.number_of_pages, None);
        assert!(book.publishers.is_empty());
    }

    #[test]
    fn test_author_keys_prefer_work() {
        let edition = json!({"authors": [{"key": "/authors/E1"}]});
        let work = json!({"authors": [{"author": {"key": "/authors/W1"}}]});
        let bare_work = json!({"title": "x"});

        assert_eq!(author_keys(&edition, Some(&work)), vec!["/authors/W1".to_string()]);
        assert_eq!(author_keys(&edition, Some(&bare_work)), vec!["/authors/E1".to_string()]);
        assert_eq!(author_keys(&edition, None), vec!["/authors/E1".to_string()]);
    }

    #[test]
    fn test_author_name_falls_back_to_name() {
        assert_eq!(
            author_name(&json!({"personal_name": "F. D.", "name": "Fyodor"})).as_deref(),
            Some("F. D.")
        );
        assert_eq!(author_name(&json!({"name": "Fyodor"})).as_deref(), Some("Fyodor"));
        assert_eq!(author_name(&json!({})), None);
    }

    #[test]
    fn test_parse_search_response_skips_docs_without_isbn() {
        let response: Value = serde_json::from_str(testing::OPENLIBRARY_SEARCH).unwrap();
        let hits = parse_search_response(&response).unwrap();

        assert_eq!(
            hits,
            vec![
                SearchHit::new("9780140449136", "Crime and Punishment"),
                SearchHit::new("9780000000002", "Crime and Punishment (Abridged)"),
            ]
        );
        let err = parse_search_response(&json!({"error": "x"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_fetch_by_isbn_assembles_book() {
        let fetcher = Arc::new(testing::standard_fetcher());
        let book = source(fetcher.clone())
            .fetch_by_isbn("978-0-14-044913-6")
            .await
            .unwrap();

        assert_eq!(book.isbn, "9780140449136");
        assert_eq!(book.image_url, COVER);
        assert_eq!(book.authors, vec!["Fyodor Dostoyevsky".to_string()]);
        assert_eq!(book.subjects[0], "Psychological fiction");

        let sent: Vec<String> = fetcher.requests().iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            sent,
            vec![
                urls::openlibrary_isbn("9780140449136"),
                urls::openlibrary_record("/works/OL166894W"),
                urls::openlibrary_record("/authors/OL22242A"),
            ]
        );
        let agent = fetcher.requests()[0].header("User-Agent").map(String::from);
        assert!(agent.is_some_and(|ua| ua.ends_with(&format!("({})", testing::CONTACT_EMAIL))));
    }

    #[tokio::test]
    async fn test_missing_work_and_author_degrade() {
        let fetcher = Arc::new(FixtureFetcher::new().with_json(
            urls::openlibrary_isbn("9780140449136"),
            testing::OPENLIBRARY_EDITION,
        ));

        let book = source(fetcher.clone()).fetch_by_isbn("9780140449136").await.unwrap();

        assert_eq!(book.title.as_deref(), Some("Crime and Punishment"));
        assert!(book.authors.is_empty());
        assert_eq!(
            book.subjects,
            vec!["Russian fiction".to_string(), "Murder".to_string()]
        );
        assert_eq!(fetcher.total_requests(), 3);
    }

    #[tokio::test]
    async fn test_unknown_isbn_is_not_found() {
        let fetcher = Arc::new(FixtureFetcher::new());
        let err = source(fetcher).fetch_by_isbn("0000000000").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "ISBN not found");
    }

    #[tokio::test]
    async fn test_records_are_shared_across_books() {
        let fetcher = Arc::new(testing::standard_fetcher());
        let source = source(fetcher.clone());

        assert!(source.fetch_record("/authors/OL22242A").await.is_some());
        assert!(source.fetch_record("/authors/OL22242A").await.is_some());
        assert!(source.fetch_record("/authors/OL0A").await.is_none());
        assert!(source.fetch_record("/authors/OL0A").await.is_none());

        assert_eq!(fetcher.request_count(&urls::openlibrary_record("/authors/OL22242A")), 1);
        assert_eq!(fetcher.request_count(&urls::openlibrary_record("/authors/OL0A")), 1);
    }

    #[tokio::test]
    async fn test_search_by_title() {
        let fetcher = Arc::new(testing::standard_fetcher());
        let hits = source(fetcher)
            .search_by_title("Crime and Punishment")
            .await
            .unwrap();

        assert_eq!(hits[0], SearchHit::new("9780140449136", "Crime and Punishment"));
    }
}
