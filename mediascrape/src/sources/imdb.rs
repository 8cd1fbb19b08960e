//! IMDb title search and title page extraction.

use async_trait::async_trait;
use scraper::ElementRef;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::{fetch_success, html_request, non_empty, TitleSource};
use crate::cache::{memoize, CacheKey, SharedCache, TtlCache};
use crate::config::{FetchConfig, ScraperConfig};
use crate::errors::{ElementNotFound, ScrapeError};
use crate::fetch::{escape, Fetcher};
use crate::models::{MovieDetails, SearchHit};
use crate::navigator::{
    attr, find_all, find_first, parse, static_regex, text, LocatorPath, LocatorStep,
};

const SOURCE: &str = "imdb";

/// Where each field of a title page lives.
struct TitleLocators {
    title: LocatorPath,
    poster: LocatorPath,
    hero: LocatorPath,
    metadata_row: LocatorPath,
    storyline: LocatorPath,
    directors: LocatorStep,
    writers: LocatorStep,
    stars: LocatorStep,
}

impl TitleLocators {
    fn new() -> Self {
        let above_the_fold = LocatorPath::new()
            .then("main", LocatorStep::First("main"))
            .then("content container", LocatorStep::First("div"))
            .then("page section", LocatorStep::First("section"))
            .then("above the fold", LocatorStep::First("section"));

        let hero = LocatorPath::new()
            .extend(&above_the_fold)
            .then("hero content", LocatorStep::ChildAt { tag: "div", index: 2 })
            .then("hero outer section", LocatorStep::First("section"))
            .then("hero inner section", LocatorStep::First("section"));

        let credit = |pattern: &str| LocatorStep::Containing {
            tag: "li",
            label_tags: &["a", "span"],
            pattern: static_regex(pattern),
        };

        Self {
            title: LocatorPath::new()
                .then("title heading", LocatorStep::First("h1"))
                .then("title text", LocatorStep::First("span")),
            poster: LocatorPath::new()
                .then("main", LocatorStep::First("main"))
                .then("poster image", LocatorStep::First("img")),
            metadata_row: LocatorPath::new()
                .then("metadata row", LocatorStep::ChildAt { tag: "div", index: 1 }),
            storyline: LocatorPath::new()
                .then("storyline block", LocatorStep::ChildAt { tag: "div", index: 2 })
                .then("plot column", LocatorStep::ChildAt { tag: "div", index: 1 })
                .then("plot wrapper", LocatorStep::First("div"))
                .then("plot section", LocatorStep::First("section")),
            hero,
            directors: credit("Directors?"),
            writers: credit("Writers?"),
            stars: credit("Stars?"),
        }
    }
}

fn title_locators() -> &'static TitleLocators {
    static LOCATORS: OnceLock<TitleLocators> = OnceLock::new();
    LOCATORS.get_or_init(TitleLocators::new)
}

fn search_list_path() -> &'static LocatorPath {
    static PATH: OnceLock<LocatorPath> = OnceLock::new();
    PATH.get_or_init(|| {
        LocatorPath::new()
            .then(
                "title results section",
                LocatorStep::FirstWithAttr {
                    tag: "section",
                    attr: "data-testid",
                    value: "find-results-section-title",
                },
            )
            .then("section header", LocatorStep::First("div"))
            .then("results container", LocatorStep::NextSibling)
            .then("results list", LocatorStep::First("ul"))
    })
}

fn title_href() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| static_regex(r"/title/(tt[0-9]+)/"))
}

/// Logs a missing optional field and discards the error.
fn optional<T>(field: &str, result: Result<T, ElementNotFound>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(source = SOURCE, field, step = %err.step, "Optional field absent");
            None
        }
    }
}

/// Extracts title hits from an IMDb find page, in page order.
///
/// Entries whose link is not a title link are skipped. A page without the
/// title results section is a miss.
pub fn parse_search_results(html: &str) -> Result<Vec<SearchHit>, ScrapeError> {
    let document = parse(html);
    let list = search_list_path().resolve(document.root_element())?;

    let hits = find_all(list, "li", false)
        .into_iter()
        .filter_map(|item| {
            let link = find_first(item, "a")?;
            let href = attr(link, "href")?;
            let id = title_href().captures(&href)?.get(1)?.as_str().to_string();
            Some(SearchHit::new(id, text(link)))
        })
        .collect();

    Ok(hits)
}

/// Extracts movie details from an IMDb title page.
///
/// Only the title is required; every other field degrades to `None` on its
/// own when its part of the page is missing.
pub fn parse_title_page(imdb_id: &str, html: &str) -> Result<MovieDetails, ScrapeError> {
    let locators = title_locators();
    let document = parse(html);
    let root = document.root_element();

    let title = non_empty(text(locators.title.resolve(root)?))
        .ok_or_else(|| ScrapeError::not_found(format!("Title {imdb_id} has no title")))?;

    let image_url = optional("image_url", locators.poster.resolve(root))
        .and_then(|img| attr(img, "src"));

    let hero = optional("hero", locators.hero.resolve(root));

    let metadata: Vec<ElementRef<'_>> = hero
        .and_then(|h| optional("metadata", locators.metadata_row.resolve(h)))
        .map(|row| find_all(row, "li", true))
        .unwrap_or_default();
    let linked = |index: usize| {
        metadata
            .get(index)
            .and_then(|item| find_first(*item, "a"))
            .and_then(|link| non_empty(text(link)))
    };
    let release_year = linked(0);
    let age_rating = linked(1);
    let duration = metadata.get(2).and_then(|item| non_empty(text(*item)));

    let storyline = hero.and_then(|h| optional("storyline", locators.storyline.resolve(h)));
    let tags = storyline
        .and_then(|section| find_first(section, "div"))
        .map(|chips| names(find_all(chips, "a", true)));
    let synopsis = storyline
        .and_then(|section| find_first(section, "p"))
        .and_then(|p| non_empty(text(p)));

    let credits = |field: &str, step: &LocatorStep| {
        optional(field, step.locate(root, field))
            .and_then(|row| find_first(row, "ul"))
            .map(|list| names(find_all(list, "a", true)))
    };

    Ok(MovieDetails {
        imdb_id: imdb_id.to_string(),
        title,
        image_url,
        duration,
        release_year,
        age_rating,
        directors: credits("directors", &locators.directors),
        stars: credits("stars", &locators.stars),
        writers: credits("writers", &locators.writers),
        tags,
        synopsis,
    })
}

fn names(elements: Vec<ElementRef<'_>>) -> Vec<String> {
    elements.into_iter().filter_map(|el| non_empty(text(el))).collect()
}

/// IMDb extractor.
pub struct ImdbSource {
    fetcher: Arc<dyn Fetcher>,
    fetch: FetchConfig,
    base_url: String,
    search_cache: SharedCache<Vec<SearchHit>>,
    title_cache: SharedCache<MovieDetails>,
}

impl ImdbSource {
    /// Creates an extractor with its own caches.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            fetch: config.fetch.clone(),
            base_url: config.sources.imdb_base_url.trim_end_matches('/').to_string(),
            search_cache: TtlCache::shared("imdb.search", &config.cache),
            title_cache: TtlCache::shared("imdb.title", &config.cache),
        }
    }

    /// Replaces the caches.
    #[must_use]
    pub fn with_caches(
        mut self,
        search_cache: SharedCache<Vec<SearchHit>>,
        title_cache: SharedCache<MovieDetails>,
    ) -> Self {
        self.search_cache = search_cache;
        self.title_cache = title_cache;
        self
    }

    /// Searches IMDb for titles matching `title`.
    pub async fn search_by_title(
        &self,
        title: &str,
        locale: Option<&str>,
    ) -> Result<Vec<SearchHit>, ScrapeError> {
        let language = self.fetch.accept_language(locale);
        let key = CacheKey::folded("imdb.search", [title, language.as_str()]);

        memoize(self.search_cache.as_ref(), key, move || async move {
            info!(source = SOURCE, title, "Searching titles");
            let url = format!("{}/find/?q={}", self.base_url, escape(title));
            let request = html_request(&self.fetch, url, locale);
            let page = fetch_success(self.fetcher.as_ref(), SOURCE, &request, || {
                format!("No results for '{title}'")
            })
            .await?;
            let hits = parse_search_results(&page.text)?;
            debug!(source = SOURCE, title, hits = hits.len(), "Search parsed");
            Ok(hits)
        })
        .await
    }

    /// Fetches and extracts the title page for `imdb_id`.
    pub async fn fetch_by_id(
        &self,
        imdb_id: &str,
        locale: Option<&str>,
    ) -> Result<MovieDetails, ScrapeError> {
        let imdb_id = imdb_id.trim();
        let language = self.fetch.accept_language(locale);
        let key = CacheKey::new("imdb.title", [imdb_id]).with_folded(&language);

        memoize(self.title_cache.as_ref(), key, move || async move {
            info!(source = SOURCE, imdb_id, "Fetching title page");
            let url = format!("{}/title/{}/", self.base_url, escape(imdb_id));
            let request = html_request(&self.fetch, url, locale);
            let page = fetch_success(self.fetcher.as_ref(), SOURCE, &request, || {
                format!("Title {imdb_id} not found")
            })
            .await?;
            parse_title_page(imdb_id, &page.text)
        })
        .await
    }
}

impl std::fmt::Debug for ImdbSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImdbSource")
            .field("base_url", &self.base_url)
            .field("cached_searches", &self.search_cache.len())
            .field("cached_titles", &self.title_cache.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TitleSource for ImdbSource {
    type Details = MovieDetails;

    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn search_by_title(
        &self,
        title: &str,
        locale: Option<&str>,
    ) -> Result<Vec<SearchHit>, ScrapeError> {
        Self::search_by_title(self, title, locale).await
    }

    async fn fetch_by_id(&self, id: &str, locale: Option<&str>) -> Result<MovieDetails, ScrapeError> {
        Self::fetch_by_id(self, id, locale).await
    }
}
