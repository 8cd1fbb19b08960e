//! Amazon EAN search and product page extraction.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::{fetch_success, html_request, non_empty};
use crate::cache::{memoize, CacheKey, SharedCache, TtlCache};
use crate::config::{FetchConfig, ScraperConfig};
use crate::errors::ScrapeError;
use crate::fetch::{escape, Fetcher};
use crate::models::{EanMatch, ProductDetails};
use crate::navigator::{
    attr, find_all, next_in_document, parse, static_regex, text, LocatorStep,
};

const SOURCE: &str = "amazon";

/// Detail bullet labels, matched case-insensitively anywhere in the label.
const BULLET_LABELS: [&str; 9] = [
    "run time",
    "director",
    "actors",
    "studio",
    "release date",
    "language",
    "subtitles",
    "audio format",
    "number of discs",
];

struct ProductLocators {
    title: LocatorStep,
    image: LocatorStep,
    description: LocatorStep,
    bullets: LocatorStep,
    bullet_labels: Vec<(&'static str, LocatorStep)>,
}

impl ProductLocators {
    fn new() -> Self {
        Self {
            title: LocatorStep::FirstWithAttr {
                tag: "h1",
                attr: "id",
                value: "title",
            },
            image: LocatorStep::FirstWithAttr {
                tag: "img",
                attr: "id",
                value: "landingImage",
            },
            description: LocatorStep::FirstWithAttr {
                tag: "div",
                attr: "id",
                value: "productDescription",
            },
            bullets: LocatorStep::FirstWithAttr {
                tag: "div",
                attr: "id",
                value: "detailBullets_feature_div",
            },
            bullet_labels: BULLET_LABELS
                .iter()
                .map(|label| {
                    let pattern = static_regex(&format!("(?i){}", regex::escape(label)));
                    (*label, LocatorStep::FirstMatching { tag: "span", pattern })
                })
                .collect(),
        }
    }
}

fn product_locators() -> &'static ProductLocators {
    static LOCATORS: OnceLock<ProductLocators> = OnceLock::new();
    LOCATORS.get_or_init(ProductLocators::new)
}

/// Picks the first search listing that carries an ASIN.
pub fn parse_search_page(ean: &str, html: &str) -> Result<EanMatch, ScrapeError> {
    let document = parse(html);

    find_all(document.root_element(), "div", true)
        .into_iter()
        .filter(|div| div.value().attr("role") == Some("listitem"))
        .find_map(|div| attr(div, "data-asin").and_then(non_empty))
        .map(|asin| EanMatch {
            asin,
            ean: ean.to_string(),
        })
        .ok_or_else(|| ScrapeError::not_found(format!("EAN {ean} not found")))
}

/// Extracts product details from an Amazon product page.
///
/// The title is required. Detail bullets are looked up by label and each
/// one is absent on its own when the page does not list it.
pub fn parse_product_page(
    asin: &str,
    ean: Option<&str>,
    html: &str,
) -> Result<ProductDetails, ScrapeError> {
    let locators = product_locators();
    let document = parse(html);
    let root = document.root_element();

    let title = non_empty(text(locators.title.locate(root, "product title")?))
        .ok_or_else(|| ScrapeError::not_found(format!("Product {asin} has no title")))?;

    let image_url = locators.image.apply(root).and_then(|img| attr(img, "src"));
    let description = locators
        .description
        .apply(root)
        .and_then(|div| non_empty(text(div)));

    let mut bullets: HashMap<&str, String> = HashMap::new();
    if let Some(list) = locators.bullets.apply(root) {
        for (label, step) in &locators.bullet_labels {
            let value = step
                .apply(list)
                .and_then(|span| next_in_document(span, "span"))
                .and_then(|span| non_empty(text(span)));
            if let Some(value) = value {
                bullets.insert(*label, value);
            }
        }
    } else {
        debug!(source = SOURCE, asin, "Product page has no detail bullets");
    }

    Ok(ProductDetails {
        asin: asin.to_string(),
        ean: ean.map(String::from),
        title,
        image_url,
        description,
        run_time: bullets.remove("run time"),
        director: bullets.remove("director"),
        actors: bullets.remove("actors"),
        studio: bullets.remove("studio"),
        release_date: bullets.remove("release date"),
        language: bullets.remove("language"),
        subtitles: bullets.remove("subtitles"),
        audio_format: bullets.remove("audio format"),
        number_of_discs: bullets.remove("number of discs"),
    })
}

/// Amazon extractor.
pub struct AmazonSource {
    fetcher: Arc<dyn Fetcher>,
    fetch: FetchConfig,
    base_url: String,
    ean_cache: SharedCache<EanMatch>,
    product_cache: SharedCache<ProductDetails>,
}

impl AmazonSource {
    /// Creates an extractor with its own caches.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &ScraperConfig) -> Self {
        Self {
            fetcher,
            fetch: config.fetch.clone(),
            base_url: config.sources.amazon_base_url.trim_end_matches('/').to_string(),
            ean_cache: TtlCache::shared("amazon.ean", &config.cache),
            product_cache: TtlCache::shared("amazon.product", &config.cache),
        }
    }

    /// Replaces the caches.
    #[must_use]
    pub fn with_caches(
        mut self,
        ean_cache: SharedCache<EanMatch>,
        product_cache: SharedCache<ProductDetails>,
    ) -> Self {
        self.ean_cache = ean_cache;
        self.product_cache = product_cache;
        self
    }

    /// Finds the listing for an EAN.
    pub async fn search_by_ean(&self, ean: &str) -> Result<EanMatch, ScrapeError> {
        let ean = ean.trim();
        let key = CacheKey::new("amazon.ean", [ean]);

        memoize(self.ean_cache.as_ref(), key, move || async move {
            info!(source = SOURCE, ean, "Searching by EAN");
            let url = format!("{}/s?k={}", self.base_url, escape(ean));
            let request = html_request(&self.fetch, url, None);
            let page = fetch_success(self.fetcher.as_ref(), SOURCE, &request, || {
                format!("EAN {ean} not found")
            })
            .await?;
            parse_search_page(ean, &page.text)
        })
        .await
    }

    /// Fetches and extracts the product page for `asin`.
    pub async fn fetch_by_asin(
        &self,
        asin: &str,
        ean: Option<&str>,
    ) -> Result<ProductDetails, ScrapeError> {
        let asin = asin.trim();
        let key = CacheKey::new("amazon.product", [asin, ean.unwrap_or_default()]);

        memoize(self.product_cache.as_ref(), key, move || async move {
            info!(source = SOURCE, asin, "Fetching product page");
            let url = format!("{}/dp/{}", self.base_url, escape(asin));
            let request = html_request(&self.fetch, url, None);
            let page = fetch_success(self.fetcher.as_ref(), SOURCE, &request, || {
                format!("Product {asin} not found")
            })
            .await?;
            parse_product_page(asin, ean, &page.text)
        })
        .await
    }

    /// Resolves an EAN to its first listing and fetches that product.
    pub async fn fetch_by_ean(&self, ean: &str) -> Result<ProductDetails, ScrapeError> {
        let found = self.search_by_ean(ean).await?;
        self.fetch_by_asin(&found.asin, Some(&found.ean)).await
    }
}

impl std::fmt::Debug for AmazonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmazonSource")
            .field("base_url", &self.base_url)
            .field("cached_eans", &self.ean_cache.len())
            .field("cached_products", &self.product_cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::testing::{self, urls, FixtureFetcher};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_search_page_skips_listings_without_asin() {
        let found = parse_search_page("7332431014116", testing::AMAZON_SEARCH_PAGE).unwrap();
        assert_eq!(
            found,
            EanMatch {
                asin: "B00005JLXH".to_string(),
                ean: "7332431014116".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_search_page_without_listings_is_not_found() {
        let err = parse_search_page("0000000000000", testing::AMAZON_SEARCH_EMPTY_PAGE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "EAN 0000000000000 not found");
    }

    #[test]
    fn test_parse_product_page() {
        let product =
            parse_product_page("B00005JLXH", Some("7332431014116"), testing::AMAZON_PRODUCT_PAGE)
                .unwrap();

        assert_eq!(product.title, "The Shawshank Redemption [DVD]");
        assert_eq!(product.ean.as_deref(), Some("7332431014116"));
        assert_eq!(
            product.image_url.as_deref(),
            Some("https://m.media-amazon.com/images/I/51shawshank_dvd.jpg")
        );
        assert!(product
            .description
            .as_deref()
            .is_some_and(|d| d.starts_with("Two imprisoned men bond")));
        assert_eq!(product.run_time.as_deref(), Some("2 hours and 22 minutes"));
        assert_eq!(product.director.as_deref(), Some("Frank Darabont"));
        assert_eq!(
            product.actors.as_deref(),
            Some("Tim Robbins, Morgan Freeman, Bob Gunton")
        );
        assert_eq!(product.studio.as_deref(), Some("Sandrew Metronome"));
        assert_eq!(product.release_date.as_deref(), Some("4 Jun. 2003"));
        assert_eq!(product.language.as_deref(), Some("English (Dolby Digital 5.1)"));
        assert_eq!(
            product.subtitles.as_deref(),
            Some("Swedish, Danish, Finnish, Norwegian")
        );
        assert_eq!(product.number_of_discs.as_deref(), Some("1"));
        assert_eq!(product.audio_format, None);
    }

    #[test]
    fn test_parse_product_page_without_bullets() {
        let html = r#"<html><body><h1 id="title"><span>Loose Disc</span></h1></body></html>"#;
        let product = parse_product_page("B000000001", None, html).unwrap();

        assert_eq!(product.title, "Loose Disc");
        assert_eq!(product.image_url, None);
        assert_eq!(product.description, None);
        assert_eq!(product.director, None);
        assert_eq!(product.run_time, None);
    }

    #[test]
    fn test_captcha_page_is_not_found() {
        let err = parse_product_page("B00005JLXH", None, testing::AMAZON_CAPTCHA_PAGE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("product title"));
    }

    #[tokio::test]
    async fn test_fetch_by_ean_chains_search_and_product() {
        let fetcher = Arc::new(testing::standard_fetcher());
        let source = AmazonSource::new(fetcher.clone(), &testing::test_config());

        let product = source.fetch_by_ean("7332431014116").await.unwrap();

        assert_eq!(product.asin, "B00005JLXH");
        assert_eq!(product.ean.as_deref(), Some("7332431014116"));
        assert_eq!(
            fetcher
                .requests()
                .iter()
                .map(|r| r.url.clone())
                .collect::<Vec<_>>(),
            vec![
                urls::amazon_search("7332431014116"),
                urls::amazon_product("B00005JLXH"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_ean_never_fetches_product() {
        let fetcher = Arc::new(testing::standard_fetcher());
        let source = AmazonSource::new(fetcher.clone(), &testing::test_config());

        let err = source.fetch_by_ean("0000000000000").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fetcher.total_requests(), 1);
    }

    #[tokio::test]
    async fn test_requests_use_default_locale() {
        let fetcher = Arc::new(FixtureFetcher::new().with_html(
            urls::amazon_search("7332431014116"),
            testing::AMAZON_SEARCH_PAGE,
        ));
        let source = AmazonSource::new(fetcher.clone(), &testing::test_config());

        source.search_by_ean(" 7332431014116 ").await.unwrap();

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("Accept-Language"), Some("en-US,en;q=0.5"));
    }

    #[tokio::test]
    async fn test_search_results_are_cached() {
        let fetcher = Arc::new(testing::standard_fetcher());
        let source = AmazonSource::new(fetcher.clone(), &testing::test_config());

        source.search_by_ean("7332431014116").await.unwrap();
        source.search_by_ean("7332431014116").await.unwrap();

        assert_eq!(fetcher.request_count(&urls::amazon_search("7332431014116")), 1);
    }
}
