//! Canned pages and a preloaded fetcher for the three sources.

use crate::config::{ScraperConfig, SourceConfig};
use crate::fetch::escape;

use super::mocks::FixtureFetcher;

/// Contact address used by test configurations.
pub const CONTACT_EMAIL: &str = "tests@example.com";

/// IMDb id of the fully populated title page.
pub const SHAWSHANK_IMDB_ID: &str = "tt0111161";
/// Title that finds [`SHAWSHANK_IMDB_ID`] first.
pub const SHAWSHANK_TITLE: &str = "The Shawshank Redemption";
/// EAN of the DVD listing.
pub const SHAWSHANK_EAN: &str = "7332431014116";
/// ASIN of the DVD listing.
pub const SHAWSHANK_ASIN: &str = "B00005JLXH";
/// EAN with no listings.
pub const UNKNOWN_EAN: &str = "0000000000000";
/// IMDb id whose page only carries a title.
pub const MINIMAL_IMDB_ID: &str = "tt9999999";
/// Title with no IMDb results.
pub const UNKNOWN_TITLE: &str = "qwzxv";
/// ISBN of the OpenLibrary edition.
pub const CRIME_AND_PUNISHMENT_ISBN: &str = "9780140449136";
/// Title that finds [`CRIME_AND_PUNISHMENT_ISBN`] first.
pub const CRIME_AND_PUNISHMENT_TITLE: &str = "Crime and Punishment";
/// OpenLibrary work key of the edition.
pub const CRIME_AND_PUNISHMENT_WORK: &str = "/works/OL166894W";
/// OpenLibrary author key of the edition.
pub const DOSTOYEVSKY_AUTHOR: &str = "/authors/OL22242A";

/// Fully populated IMDb title page.
pub const IMDB_TITLE_PAGE: &str = include_str!("fixtures/imdb_title.html");
/// IMDb title page with only a heading.
pub const IMDB_TITLE_MINIMAL_PAGE: &str = include_str!("fixtures/imdb_title_minimal.html");
/// IMDb error page.
pub const IMDB_NOT_FOUND_PAGE: &str = include_str!("fixtures/imdb_not_found.html");
/// IMDb find page with title results.
pub const IMDB_SEARCH_PAGE: &str = include_str!("fixtures/imdb_search.html");
/// IMDb find page without a title section.
pub const IMDB_SEARCH_EMPTY_PAGE: &str = include_str!("fixtures/imdb_search_empty.html");
/// Amazon search page with listings.
pub const AMAZON_SEARCH_PAGE: &str = include_str!("fixtures/amazon_search.html");
/// Amazon search page without listings.
pub const AMAZON_SEARCH_EMPTY_PAGE: &str = include_str!("fixtures/amazon_search_empty.html");
/// Amazon product page.
pub const AMAZON_PRODUCT_PAGE: &str = include_str!("fixtures/amazon_product.html");
/// Amazon robot check page.
pub const AMAZON_CAPTCHA_PAGE: &str = include_str!("fixtures/amazon_captcha.html");
/// OpenLibrary edition record.
pub const OPENLIBRARY_EDITION: &str = include_str!("fixtures/openlibrary_edition.json");
/// OpenLibrary work record.
pub const OPENLIBRARY_WORK: &str = include_str!("fixtures/openlibrary_work.json");
/// OpenLibrary author record.
pub const OPENLIBRARY_AUTHOR: &str = include_str!("fixtures/openlibrary_author.json");
/// OpenLibrary search response.
pub const OPENLIBRARY_SEARCH: &str = include_str!("fixtures/openlibrary_search.json");

/// Configuration with default endpoints and a test contact address.
#[must_use]
pub fn test_config() -> ScraperConfig {
    ScraperConfig::new().with_sources(SourceConfig::default().with_contact_email(CONTACT_EMAIL))
}

/// URLs the sources request, built against the default endpoints.
pub mod urls {
    use super::escape;

    const IMDB: &str = "https://www.imdb.com";
    const AMAZON: &str = "https://www.amazon.se";
    const OPENLIBRARY: &str = "https://openlibrary.org";

    /// IMDb title page.
    #[must_use]
    pub fn imdb_title(imdb_id: &str) -> String {
        format!("{IMDB}/title/{}/", escape(imdb_id))
    }

    /// IMDb find page.
    #[must_use]
    pub fn imdb_search(title: &str) -> String {
        format!("{IMDB}/find/?q={}", escape(title))
    }

    /// Amazon search page.
    #[must_use]
    pub fn amazon_search(ean: &str) -> String {
        format!("{AMAZON}/s?k={}", escape(ean))
    }

    /// Amazon product page.
    #[must_use]
    pub fn amazon_product(asin: &str) -> String {
        format!("{AMAZON}/dp/{}", escape(asin))
    }

    /// OpenLibrary edition record.
    #[must_use]
    pub fn openlibrary_isbn(isbn: &str) -> String {
        format!("{OPENLIBRARY}/isbn/{}.json", escape(isbn))
    }

    /// OpenLibrary record by key.
    #[must_use]
    pub fn openlibrary_record(key: &str) -> String {
        format!("{OPENLIBRARY}{key}.json")
    }

    /// OpenLibrary search.
    #[must_use]
    pub fn openlibrary_search(title: &str) -> String {
        format!(
            "{OPENLIBRARY}/search.json?q={}&fields=key,title,isbn&limit=10",
            escape(title)
        )
    }
}

/// A fetcher serving every canned page at the URL the sources request.
#[must_use]
pub fn standard_fetcher() -> FixtureFetcher {
    FixtureFetcher::new()
        .with_html(urls::imdb_title(SHAWSHANK_IMDB_ID), IMDB_TITLE_PAGE)
        .with_html(urls::imdb_title(MINIMAL_IMDB_ID), IMDB_TITLE_MINIMAL_PAGE)
        .with_html(urls::imdb_search(SHAWSHANK_TITLE), IMDB_SEARCH_PAGE)
        .with_html(urls::imdb_search(UNKNOWN_TITLE), IMDB_SEARCH_EMPTY_PAGE)
        .with_html(urls::amazon_search(SHAWSHANK_EAN), AMAZON_SEARCH_PAGE)
        .with_html(urls::amazon_search(UNKNOWN_EAN), AMAZON_SEARCH_EMPTY_PAGE)
        .with_html(urls::amazon_product(SHAWSHANK_ASIN), AMAZON_PRODUCT_PAGE)
        .with_json(urls::openlibrary_isbn(CRIME_AND_PUNISHMENT_ISBN), OPENLIBRARY_EDITION)
        .with_json(urls::openlibrary_record(CRIME_AND_PUNISHMENT_WORK), OPENLIBRARY_WORK)
        .with_json(urls::openlibrary_record(DOSTOYEVSKY_AUTHOR), OPENLIBRARY_AUTHOR)
        .with_json(urls::openlibrary_search(CRIME_AND_PUNISHMENT_TITLE), OPENLIBRARY_SEARCH)
        .with_json(urls::openlibrary_search(UNKNOWN_TITLE), r#"{"numFound": 0, "start": 0, "docs": []}"#)
}
