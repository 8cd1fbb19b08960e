//! # Mediascrape
//!
//! Metadata lookups for books and movies, scraped from IMDb and Amazon and
//! read from the OpenLibrary API.
//!
//! A lookup names a category (`book`, `movie`), a search type (`isbn`,
//! `title`, `ean`, `imdb_id`) and a query:
//!
//! - **Hierarchy**: staged selection rejects pairs the hierarchy does not offer
//! - **Dispatch**: each pair maps to a handler over one of the sources
//! - **Extraction**: named locator paths over parsed HTML, with per-field fallbacks
//! - **Caching**: per-source TTL caches keyed by normalized arguments
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mediascrape::prelude::*;
//!
//! let config = ScraperConfig::from_env()?;
//! let dispatcher = Dispatcher::from_config(&config)?;
//!
//! let movie = dispatcher.search("movie", "imdb_id", "tt0111161", Some("sv-SE")).await?;
//! println!("{}", serde_json::to_string_pretty(&movie)?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fetch;
pub mod models;
pub mod navigator;
pub mod observability;
pub mod sources;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{memoize, CacheKey, NoOpCache, QueryCache, SharedCache, TtlCache};
    pub use crate::config::{CacheConfig, FetchConfig, LoggingConfig, ScraperConfig, SourceConfig};
    pub use crate::dispatch::{
        DispatchTable, Dispatcher, Handler, ResolvedQuery, SearchCategory, SearchHierarchy,
        SearchType,
    };
    pub use crate::errors::{ElementNotFound, ErrorKind, ScrapeError};
    pub use crate::fetch::{FetchRequest, FetchResult, Fetcher, HttpFetcher};
    pub use crate::models::{
        BookDetails, DetailResult, EanMatch, MovieDetails, ProductDetails, SearchHit,
    };
    pub use crate::observability::init_tracing;
    pub use crate::sources::{AmazonSource, ImdbSource, OpenLibrarySource, TitleSource};
}
