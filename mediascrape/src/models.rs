//! Typed lookup results.
//!
//! Each source returns its own shape; [`DetailResult`] tags which one a
//! lookup produced so callers can match on it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of a title search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Source-specific identifier (IMDb id, ISBN).
    pub id: String,
    /// Display title.
    pub title: String,
}

impl SearchHit {
    /// Creates a new hit.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Movie metadata scraped from an IMDb title page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetails {
    /// IMDb identifier, e.g. `tt0111161`.
    pub imdb_id: String,
    /// Title.
    pub title: String,
    /// Poster URL.
    pub image_url: Option<String>,
    /// Running time as displayed, e.g. `2h 22m`.
    pub duration: Option<String>,
    /// Release year as displayed.
    pub release_year: Option<String>,
    /// Certificate, e.g. `R`.
    pub age_rating: Option<String>,
    /// Director names.
    pub directors: Option<Vec<String>>,
    /// Principal cast.
    pub stars: Option<Vec<String>>,
    /// Writer names.
    pub writers: Option<Vec<String>>,
    /// Genre and interest tags.
    pub tags: Option<Vec<String>>,
    /// Plot summary.
    pub synopsis: Option<String>,
}

/// Product metadata scraped from an Amazon product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    /// Amazon standard identification number.
    pub asin: String,
    /// EAN the product was found by, when known.
    pub ean: Option<String>,
    /// Product title.
    pub title: String,
    /// Main product image.
    pub image_url: Option<String>,
    /// Product description.
    pub description: Option<String>,
    /// Run time bullet.
    pub run_time: Option<String>,
    /// Director bullet.
    pub director: Option<String>,
    /// Actors bullet.
    pub actors: Option<String>,
    /// Studio bullet.
    pub studio: Option<String>,
    /// Release date bullet.
    pub release_date: Option<String>,
    /// Language bullet.
    pub language: Option<String>,
    /// Subtitles bullet.
    pub subtitles: Option<String>,
    /// Audio format bullet.
    pub audio_format: Option<String>,
    /// Number of discs bullet.
    pub number_of_discs: Option<String>,
}

/// Book metadata merged from OpenLibrary edition, work and author records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    /// ISBN the lookup was made with.
    pub isbn: String,
    /// Large cover image URL.
    pub image_url: String,
    /// Title.
    pub title: Option<String>,
    /// Subtitle.
    pub subtitle: Option<String>,
    /// ISBN-10 identifiers of the edition.
    pub isbn_10: Option<Vec<String>>,
    /// ISBN-13 identifiers of the edition.
    pub isbn_13: Option<Vec<String>>,
    /// Author display names.
    pub authors: Vec<String>,
    /// Publish date as recorded.
    pub publish_date: Option<String>,
    /// Page count.
    pub number_of_pages: Option<i64>,
    /// Publishers.
    pub publishers: Vec<String>,
    /// Subjects.
    pub subjects: Vec<String>,
}

/// Listing matched by an EAN search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EanMatch {
    /// ASIN of the first listing.
    pub asin: String,
    /// EAN that was searched for.
    pub ean: String,
}

/// The result of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetailResult {
    /// IMDb title.
    Movie(MovieDetails),
    /// Amazon product.
    Product(ProductDetails),
    /// OpenLibrary book.
    Book(BookDetails),
}

impl DetailResult {
    /// Variant name as serialized in `kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Movie(_) => "movie",
            Self::Product(_) => "product",
            Self::Book(_) => "book",
        }
    }

    /// Display title, if the source found one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Movie(m) => Some(&m.title),
            Self::Product(p) => Some(&p.title),
            Self::Book(b) => b.title.as_deref(),
        }
    }

    /// Converts to a flat field map, absent fields included as `null`.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        }
    }
}

impl From<MovieDetails> for DetailResult {
    fn from(details: MovieDetails) -> Self {
        Self::Movie(details)
    }
}

impl From<ProductDetails> for DetailResult {
    fn from(details: ProductDetails) -> Self {
        Self::Product(details)
    }
}

impl From<BookDetails> for DetailResult {
    fn from(details: BookDetails) -> Self {
        Self::Book(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn book() -> BookDetails {
        BookDetails {
            isbn: "9780140449136".to_string(),
            image_url: "https://covers.openlibrary.org/b/isbn/9780140449136-L.jpg".to_string(),
            title: Some("Crime and Punishment".to_string()),
            subtitle: None,
            isbn_10: Some(vec!["0140449132".to_string()]),
            isbn_13: None,
            authors: vec!["Fyodor Dostoyevsky".to_string()],
            publish_date: Some("2003".to_string()),
            number_of_pages: Some(671),
            publishers: vec![],
            subjects: vec![],
        }
    }

    #[test]
    fn test_to_dict_is_flat_with_nulls() {
        let dict = DetailResult::from(book()).to_dict();

        assert_eq!(dict.get("kind"), Some(&serde_json::json!("book")));
        assert_eq!(dict.get("title"), Some(&serde_json::json!("Crime and Punishment")));
        assert_eq!(dict.get("subtitle"), Some(&serde_json::Value::Null));
        assert_eq!(dict.get("number_of_pages"), Some(&serde_json::json!(671)));
        assert_eq!(dict.get("authors"), Some(&serde_json::json!(["Fyodor Dostoyevsky"])));
    }

    #[test]
    fn test_round_trip_keeps_variant() {
        let result = DetailResult::from(book());
        let json = serde_json::to_string(&result).unwrap();
        let back: DetailResult = serde_json::from_str(&json).unwrap();

        assert_eq!(back.kind(), "book");
        assert_eq!(back, result);
    }

    #[test]
    fn test_title_accessor() {
        assert_eq!(DetailResult::from(book()).title(), Some("Crime and Punishment"));

        let untitled = BookDetails { title: None, ..book() };
        assert_eq!(DetailResult::from(untitled).title(), None);
    }
}
