//! Testing utilities for mediascrape.
//!
//! This module provides:
//! - Canned IMDb, Amazon and OpenLibrary documents
//! - A URL-routed fetcher that records requests
//! - A fetcher that panics, for exercising failure isolation

mod fixtures;
mod mocks;

pub use fixtures::*;
pub use mocks::{CannedResponse, FixtureFetcher, PanickingFetcher};
