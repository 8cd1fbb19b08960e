//! Lookup dispatch.
//!
//! A lookup is selected stage by stage through the [`SearchHierarchy`], then
//! routed by a [`DispatchTable`] from its `(category, search type)` pair to a
//! [`Handler`]. Pairs the hierarchy offers but the table lacks fail with
//! [`ScrapeError::NotImplemented`]. A panicking handler is contained and
//! reported as an internal error.

mod hierarchy;


pub use hierarchy::{
    CategorySelection, ResolvedQuery, SearchCategory, SearchCategoryEntry, SearchHierarchy,
    SearchType, SearchTypeEntry, TypeSelection,
};

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ScraperConfig;
use crate::errors::ScrapeError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::DetailResult;
use crate::sources::{search_then_fetch, AmazonSource, ImdbSource, OpenLibrarySource};

/// A lookup implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    /// IMDb title page by id.
    ImdbById,
    /// IMDb search, then the first title page.
    ImdbByTitle,
    /// Amazon EAN search, then the first product page.
    AmazonByEan,
    /// OpenLibrary edition by ISBN.
    OpenLibraryByIsbn,
    /// OpenLibrary search, then the first edition.
    OpenLibraryByTitle,
}

impl Handler {
    /// Name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ImdbById => "imdb_by_id",
            Self::ImdbByTitle => "imdb_by_title",
            Self::AmazonByEan => "amazon_by_ean",
            Self::OpenLibraryByIsbn => "openlibrary_by_isbn",
            Self::OpenLibraryByTitle => "openlibrary_by_title",
        }
    }
}

/// Maps `(category, search type)` pairs to handlers.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<(SearchCategory, SearchType), Handler>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler for every pair of the standard hierarchy.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .register(SearchCategory::Book, SearchType::Isbn, Handler::OpenLibraryByIsbn)
            .register(SearchCategory::Book, SearchType::Title, Handler::OpenLibraryByTitle)
            .register(SearchCategory::Movie, SearchType::Ean, Handler::AmazonByEan)
            .register(SearchCategory::Movie, SearchType::Title, Handler::ImdbByTitle)
            .register(SearchCategory::Movie, SearchType::ImdbId, Handler::ImdbById)
    }

    /// Registers a handler, replacing any previous one for the pair.
    #[must_use]
    pub fn register(
        mut self,
        category: SearchCategory,
        search_type: SearchType,
        handler: Handler,
    ) -> Self {
        self.handlers.insert((category, search_type), handler);
        self
    }

    /// Removes the handler for a pair.
    #[must_use]
    pub fn without(mut self, category: SearchCategory, search_type: SearchType) -> Self {
        self.handlers.remove(&(category, search_type));
        self
    }

    /// Looks up the handler for a pair.
    #[must_use]
    pub fn lookup(&self, category: SearchCategory, search_type: SearchType) -> Option<Handler> {
        self.handlers.get(&(category, search_type)).copied()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Runs lookups against the three sources.
#[derive(Debug)]
pub struct Dispatcher {
    hierarchy: &'static SearchHierarchy,
    table: DispatchTable,
    imdb: ImdbSource,
    amazon: AmazonSource,
    openlibrary: OpenLibrarySource,
}

impl Dispatcher {
    /// Creates a dispatcher whose sources share one fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &ScraperConfig) -> Self {
        Self {
            hierarchy: SearchHierarchy::global(),
            table: DispatchTable::standard(),
            imdb: ImdbSource::new(fetcher.clone(), config),
            amazon: AmazonSource::new(fetcher.clone(), config),
            openlibrary: OpenLibrarySource::new(fetcher, config),
        }
    }

    /// Creates a dispatcher that fetches over HTTP.
    pub fn from_config(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Ok(Self::new(Arc::new(fetcher), config))
    }

    /// Replaces the dispatch table.
    #[must_use]
    pub fn with_table(mut self, table: DispatchTable) -> Self {
        self.table = table;
        self
    }

    /// Replaces the sources.
    #[must_use]
    pub fn with_sources(
        mut self,
        imdb: ImdbSource,
        amazon: AmazonSource,
        openlibrary: OpenLibrarySource,
    ) -> Self {
        self.imdb = imdb;
        self.amazon = amazon;
        self.openlibrary = openlibrary;
        self
    }

    /// The hierarchy lookups are selected from.
    #[must_use]
    pub const fn hierarchy(&self) -> &'static SearchHierarchy {
        self.hierarchy
    }

    /// Selects and runs a lookup from raw names.
    pub async fn search(
        &self,
        category: &str,
        search_type: &str,
        query: &str,
        locale: Option<&str>,
    ) -> Result<DetailResult, ScrapeError> {
        let resolved = self
            .hierarchy
            .select_category(category)?
            .select_type(search_type)?
            .with_query(query, locale)?;
        self.dispatch(&resolved).await
    }

    /// Runs a resolved lookup.
    pub async fn dispatch(&self, query: &ResolvedQuery) -> Result<DetailResult, ScrapeError> {
        let Some(handler) = self.table.lookup(query.category(), query.search_type()) else {
            warn!(lookup = %query.describe(), "No handler registered");
            return Err(ScrapeError::not_implemented(format!(
                "{} is not implemented",
                query.describe()
            )));
        };

        let span = info_span!(
            "lookup",
            lookup_id = %Uuid::new_v4(),
            category = %query.category(),
            search_type = %query.search_type(),
            handler = handler.name(),
        );

        async move {
            let start = Instant::now();
            info!(query = query.query(), "Lookup started");

            let outcome = AssertUnwindSafe(self.run(handler, query))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ScrapeError::Internal(panic_message(&*panic))));

            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            match &outcome {
                Ok(result) => info!(duration_ms, kind = result.kind(), "Lookup completed"),
                Err(err) if err.is_expected() => {
                    info!(duration_ms, error = %err, "Lookup found nothing");
                }
                Err(err) => error!(duration_ms, error = %err, "Lookup failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, handler: Handler, query: &ResolvedQuery) -> Result<DetailResult, ScrapeError> {
        let text = query.query();
        let locale = query.locale();

        match handler {
            Handler::ImdbById => self.imdb.fetch_by_id(text, locale).await.map(Into::into),
            Handler::ImdbByTitle => search_then_fetch(&self.imdb, text, locale)
                .await
                .map(Into::into),
            Handler::AmazonByEan => self.amazon.fetch_by_ean(text).await.map(Into::into),
            Handler::OpenLibraryByIsbn => self.openlibrary.fetch_by_isbn(text).await.map(Into::into),
            Handler::OpenLibraryByTitle => search_then_fetch(&self.openlibrary, text, locale)
                .await
                .map(Into::into),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
