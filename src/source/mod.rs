//! Listing sources: the pluggable fetch interface over one paginated API.
//!
//! - [`ListingSource`] - trait the controller drives, one page per call
//! - [`RawRecord`] - source-side record, every field optional
//! - [`http`] - reference implementation for a Yelp-style search endpoint

pub mod http;

pub use http::HttpListingSource;

use crate::config::Credential;
use crate::error::FetchError;
use crate::types::Query;
use serde::{Deserialize, Serialize};

/// One bounded batch of raw records returned by a single fetch
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Records on this page, at most [`ListingSource::page_size`]
    pub records: Vec<RawRecord>,
    /// Whether another page can be requested
    pub has_more: bool,
    /// Total matches reported by the source, if it reports one
    pub total: Option<u64>,
}

/// Abstraction over one paginated listings API, enabling testability.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Maximum number of records the source returns per page
    fn page_size(&self) -> u32;

    /// Fetch page `page` (zero-based) of results for `query`
    async fn fetch(
        &self,
        query: &Query,
        page: u32,
        credential: &Credential,
    ) -> Result<Page, FetchError>;
}

/// Raw business record as delivered by the upstream API
///
/// All fields are optional so that decoding tolerates sparse records; the
/// [normalizer](crate::normalize) decides which omissions are fatal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Business name (required by the normalizer)
    #[serde(default)]
    pub name: Option<String>,
    /// Categories; the first title becomes the listing category
    #[serde(default, deserialize_with = "null_as_empty")]
    pub categories: Vec<RawCategory>,
    /// Postal location (city is required by the normalizer)
    #[serde(default)]
    pub location: Option<RawLocation>,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Listing URL
    #[serde(default)]
    pub url: Option<String>,
    /// Coordinates; either field may be null upstream
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
}

/// Raw category entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCategory {
    /// Display title (e.g., "Pizza")
    #[serde(default)]
    pub title: Option<String>,
}

/// Raw location block
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLocation {
    /// First street address line
    #[serde(default)]
    pub address1: Option<String>,
    /// City
    #[serde(default)]
    pub city: Option<String>,
    /// State or province code
    #[serde(default)]
    pub state: Option<String>,
    /// Postal or zip code
    #[serde(default)]
    pub zip_code: Option<String>,
}

/// Raw coordinates block
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCoordinates {
    /// Latitude in degrees
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
