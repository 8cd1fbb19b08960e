//! Error types for mediascrape lookups.
//!
//! Every failure a lookup can produce collapses into [`ScrapeError`]. The
//! presentation layer only needs [`ScrapeError::kind`] and
//! [`ScrapeError::public_message`] to decide what to show.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for lookups.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// The resource is absent or the page layout was not recognized.
    #[error("{0}")]
    NotFound(String),

    /// The category is not part of the search hierarchy.
    #[error("Invalid search category: {0}")]
    InvalidCategory(String),

    /// The search type is unknown or not allowed for the category.
    #[error("Invalid search type '{search_type}' for category '{category}'")]
    InvalidType {
        /// The selected category.
        category: String,
        /// The rejected search type.
        search_type: String,
    },

    /// The lookup is part of the hierarchy but has no backing handler.
    #[error("{0}")]
    NotImplemented(String),

    /// The upstream answered with a status that is not a plain miss.
    #[error("Upstream unavailable: HTTP {status} from {url}")]
    UpstreamUnavailable {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ScrapeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`ScrapeError::NotFound`].
    NotFound,
    /// See [`ScrapeError::InvalidCategory`].
    InvalidCategory,
    /// See [`ScrapeError::InvalidType`].
    InvalidType,
    /// See [`ScrapeError::NotImplemented`].
    NotImplemented,
    /// Upstream status or transport failures.
    UpstreamUnavailable,
    /// Everything else.
    Internal,
}

impl ErrorKind {
    /// Stable name used in serialized errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidCategory => "invalid_category",
            Self::InvalidType => "invalid_type",
            Self::NotImplemented => "not_implemented",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Internal => "internal",
        }
    }
}

impl ScrapeError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates an invalid type error.
    #[must_use]
    pub fn invalid_type(category: impl Into<String>, search_type: impl Into<String>) -> Self {
        Self::InvalidType {
            category: category.into(),
            search_type: search_type.into(),
        }
    }

    /// Creates a not implemented error.
    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    /// Creates an upstream unavailable error.
    #[must_use]
    pub fn upstream(status: u16, url: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            status,
            url: url.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidCategory(_) => ErrorKind::InvalidCategory,
            Self::InvalidType { .. } => ErrorKind::InvalidType,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::UpstreamUnavailable { .. } | Self::Http(_) => ErrorKind::UpstreamUnavailable,
            Self::Decode(_) | Self::Configuration(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the presentation layer should show this error's message verbatim.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound
                | ErrorKind::InvalidCategory
                | ErrorKind::InvalidType
                | ErrorKind::NotImplemented
        )
    }

    /// Message safe to hand to an end user.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_expected() {
            self.to_string()
        } else {
            "Internal Error".to_string()
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind().as_str()));
        map.insert("message".to_string(), serde_json::json!(self.public_message()));

        match self {
            Self::InvalidType { category, search_type } => {
                map.insert("category".to_string(), serde_json::json!(category));
                map.insert("search_type".to_string(), serde_json::json!(search_type));
            }
            Self::UpstreamUnavailable { status, .. } => {
                map.insert("status".to_string(), serde_json::json!(status));
            }
            _ => {}
        }

        map
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Raised by the HTML navigator when a locator step matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Element not found at step '{step}' ({locator})")]
pub struct ElementNotFound {
    /// Name of the step that failed.
    pub step: String,
    /// Description of the locator used by the step.
    pub locator: String,
}

impl ElementNotFound {
    /// Creates a new element not found error.
    #[must_use]
    pub fn new(step: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            locator: locator.into(),
        }
    }
}

impl From<ElementNotFound> for ScrapeError {
    fn from(err: ElementNotFound) -> Self {
        Self::NotFound(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ScrapeError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            ScrapeError::InvalidCategory("music".into()).kind(),
            ErrorKind::InvalidCategory
        );
        assert_eq!(ScrapeError::invalid_type("book", "ean").kind(), ErrorKind::InvalidType);
        assert_eq!(ScrapeError::upstream(503, "https://x").kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(ScrapeError::Http("reset".into()).kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(ScrapeError::Decode("eof".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_public_message_hides_unexpected_errors() {
        let err = ScrapeError::Internal("stack details".to_string());
        assert!(!err.is_expected());
        assert_eq!(err.public_message(), "Internal Error");

        let err = ScrapeError::not_found("ISBN not found");
        assert!(err.is_expected());
        assert_eq!(err.public_message(), "ISBN not found");
    }

    #[test]
    fn test_invalid_type_to_dict() {
        let err = ScrapeError::invalid_type("book", "imdb_id");
        let dict = err.to_dict();

        assert_eq!(dict.get("kind").unwrap(), "invalid_type");
        assert_eq!(dict.get("category").unwrap(), "book");
        assert_eq!(dict.get("search_type").unwrap(), "imdb_id");
    }

    #[test]
    fn test_upstream_to_dict_hides_url() {
        let dict = ScrapeError::upstream(502, "https://www.imdb.com/title/tt1/").to_dict();
        assert_eq!(dict.get("message").unwrap(), "Internal Error");
        assert_eq!(dict.get("status").unwrap(), 502);
    }

    #[test]
    fn test_element_not_found_becomes_not_found() {
        let err: ScrapeError = ElementNotFound::new("metadata row", "div:nth-child(1)").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("metadata row"));
    }
}
