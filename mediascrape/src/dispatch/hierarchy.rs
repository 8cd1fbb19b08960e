//! The static category and search-type hierarchy, and the staged selection
//! that walks it.
//!
//! Selection only moves forward: a [`CategorySelection`] can only produce a
//! [`TypeSelection`], which can only produce a [`ResolvedQuery`]. A query
//! can therefore never be attached before both choices are valid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::ScrapeError;

/// Top-level media category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    /// Books.
    Book,
    /// Movies.
    Movie,
}

impl SearchCategory {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Movie => "movie",
        }
    }
}

impl fmt::Display for SearchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchCategory {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "book" => Ok(Self::Book),
            "movie" => Ok(Self::Movie),
            _ => Err(ScrapeError::InvalidCategory(s.to_string())),
        }
    }
}

/// How a query identifies the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// EAN barcode.
    Ean,
    /// IMDb title id.
    ImdbId,
    /// ISBN.
    Isbn,
    /// Free-text title.
    Title,
}

impl SearchType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ean => "ean",
            Self::ImdbId => "imdb_id",
            Self::Isbn => "isbn",
            Self::Title => "title",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ean" => Some(Self::Ean),
            "imdb_id" => Some(Self::ImdbId),
            "isbn" => Some(Self::Isbn),
            "title" => Some(Self::Title),
            _ => None,
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A search type offered under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchTypeEntry {
    /// Search type.
    pub search_type: SearchType,
    /// Display title.
    pub title: &'static str,
}

/// A category and the search types it offers, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCategoryEntry {
    /// Category.
    pub category: SearchCategory,
    /// Display title.
    pub title: &'static str,
    /// Offered search types.
    pub search_types: Vec<SearchTypeEntry>,
}

impl SearchCategoryEntry {
    /// Looks up an offered search type.
    #[must_use]
    pub fn search_type(&self, search_type: SearchType) -> Option<&SearchTypeEntry> {
        self.search_types
            .iter()
            .find(|entry| entry.search_type == search_type)
    }
}

/// The set of categories and search types a lookup may select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHierarchy {
    categories: Vec<SearchCategoryEntry>,
}

impl SearchHierarchy {
    /// The built-in hierarchy.
    #[must_use]
    pub fn standard() -> Self {
        let entry = |search_type, title| SearchTypeEntry { search_type, title };
        Self {
            categories: vec![
                SearchCategoryEntry {
                    category: SearchCategory::Book,
                    title: "Book",
                    search_types: vec![
                        entry(SearchType::Isbn, "ISBN"),
                        entry(SearchType::Title, "Title"),
                    ],
                },
                SearchCategoryEntry {
                    category: SearchCategory::Movie,
                    title: "Movie",
                    search_types: vec![
                        entry(SearchType::Ean, "EAN"),
                        entry(SearchType::Title, "Title"),
                        entry(SearchType::ImdbId, "IMDB ID"),
                    ],
                },
            ],
        }
    }

    /// Shared instance of [`SearchHierarchy::standard`].
    #[must_use]
    pub fn global() -> &'static Self {
        static HIERARCHY: OnceLock<SearchHierarchy> = OnceLock::new();
        HIERARCHY.get_or_init(Self::standard)
    }

    /// All categories, in display order.
    #[must_use]
    pub fn categories(&self) -> &[SearchCategoryEntry] {
        &self.categories
    }

    /// Looks up a category.
    #[must_use]
    pub fn category(&self, category: SearchCategory) -> Option<&SearchCategoryEntry> {
        self.categories.iter().find(|entry| entry.category == category)
    }

    /// Whether the pair is part of the hierarchy.
    #[must_use]
    pub fn allows(&self, category: SearchCategory, search_type: SearchType) -> bool {
        self.category(category)
            .is_some_and(|entry| entry.search_type(search_type).is_some())
    }

    /// First stage: selects a category by name.
    pub fn select_category(&self, raw: &str) -> Result<CategorySelection<'_>, ScrapeError> {
        let category: SearchCategory = raw.parse()?;
        let entry = self
            .category(category)
            .ok_or_else(|| ScrapeError::InvalidCategory(raw.to_string()))?;
        Ok(CategorySelection { entry })
    }

    /// Converts to a dictionary representation: category name to its
    /// title and offered search types.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.categories
            .iter()
            .map(|entry| {
                let types: serde_json::Map<String, serde_json::Value> = entry
                    .search_types
                    .iter()
                    .map(|t| (t.search_type.as_str().to_string(), serde_json::json!(t.title)))
                    .collect();
                (
                    entry.category.as_str().to_string(),
                    serde_json::json!({
                        "title": entry.title,
                        "search_types": types,
                    }),
                )
            })
            .collect()
    }
}

/// A lookup with its category chosen.
#[derive(Debug, Clone, Copy)]
pub struct CategorySelection<'h> {
    entry: &'h SearchCategoryEntry,
}

impl<'h> CategorySelection<'h> {
    /// The selected category.
    #[must_use]
    pub fn category(&self) -> SearchCategory {
        self.entry.category
    }

    /// Search types the category offers.
    #[must_use]
    pub fn search_types(&self) -> &'h [SearchTypeEntry] {
        &self.entry.search_types
    }

    /// Second stage: selects a search type offered by the category.
    pub fn select_type(self, raw: &str) -> Result<TypeSelection, ScrapeError> {
        let invalid = || ScrapeError::invalid_type(self.entry.category.as_str(), raw);
        let search_type = SearchType::parse(raw).ok_or_else(invalid)?;
        let entry = self.entry.search_type(search_type).ok_or_else(invalid)?;

        Ok(TypeSelection {
            category: self.entry.category,
            search_type,
            category_title: self.entry.title,
            type_title: entry.title,
        })
    }
}

/// A lookup with category and search type chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSelection {
    category: SearchCategory,
    search_type: SearchType,
    category_title: &'static str,
    type_title: &'static str,
}

impl TypeSelection {
    /// The selected category.
    #[must_use]
    pub const fn category(&self) -> SearchCategory {
        self.category
    }

    /// The selected search type.
    #[must_use]
    pub const fn search_type(&self) -> SearchType {
        self.search_type
    }

    /// Final stage: attaches the query.
    ///
    /// A blank query can match nothing and is rejected as not found.
    pub fn with_query(
        self,
        query: &str,
        locale: Option<&str>,
    ) -> Result<ResolvedQuery, ScrapeError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScrapeError::not_found(format!(
                "Empty {} query",
                self.type_title
            )));
        }

        Ok(ResolvedQuery {
            selection: self,
            query: query.to_string(),
            locale: locale
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        })
    }
}

/// A fully selected lookup, ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    selection: TypeSelection,
    query: String,
    locale: Option<String>,
}

impl ResolvedQuery {
    /// The selected category.
    #[must_use]
    pub const fn category(&self) -> SearchCategory {
        self.selection.category
    }

    /// The selected search type.
    #[must_use]
    pub const fn search_type(&self) -> SearchType {
        self.selection.search_type
    }

    /// The trimmed query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The requested locale, if any.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Human readable name of the lookup, e.g. `Movie by IMDB ID`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} by {}",
            self.selection.category_title, self.selection.type_title
        )
    }
}
