//! Reference listing source for a Yelp Fusion style business search endpoint.

use reqwest::StatusCode;
use serde::Deserialize;

use super::{ListingSource, Page, RawRecord};
use crate::config::{Credential, SourceConfig};
use crate::error::{Error, FetchError, Result};
use crate::types::Query;

/// Longest error-body excerpt carried into error messages
const MAX_ERROR_BODY: usize = 200;

/// Search response envelope
#[derive(Debug, Deserialize)]
struct SearchResponse {
    businesses: Vec<RawRecord>,
    #[serde(default)]
    total: Option<u64>,
}

/// Error envelope some endpoints return alongside 4xx/5xx statuses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// HTTP listing source with offset pagination
///
/// Sends `GET {endpoint}?term=&location=&limit=&offset=` with a bearer token.
/// Page `n` starts at offset `n * page_size`; the source never asks for
/// results beyond `max_results`.
#[derive(Debug, Clone)]
pub struct HttpListingSource {
    client: reqwest::Client,
    endpoint: url::Url,
    page_size: u32,
    max_results: u64,
}

impl HttpListingSource {
    /// Create a source from configuration
    ///
    /// # Errors
    /// Returns a configuration error if the settings are invalid or the HTTP
    /// client cannot be created
    pub fn new(config: &SourceConfig) -> Result<Self> {
        config.validate()?;
        let endpoint = url::Url::parse(&config.endpoint)
            .map_err(|e| Error::config("source.endpoint", format!("invalid endpoint URL: {e}")))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: None,
            })?;

        Ok(Self {
            client,
            endpoint,
            page_size: config.page_size,
            max_results: config.max_results,
        })
    }

    fn offset_for(&self, page: u32) -> u64 {
        u64::from(page) * u64::from(self.page_size)
    }
}

#[async_trait::async_trait]
impl ListingSource for HttpListingSource {
    fn name(&self) -> &str {
        self.endpoint.host_str().unwrap_or("http")
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn fetch(
        &self,
        query: &Query,
        page: u32,
        credential: &Credential,
    ) -> std::result::Result<Page, FetchError> {
        let offset = self.offset_for(page);
        if offset >= self.max_results {
            tracing::debug!(page, offset, "Offset beyond result window, nothing to fetch");
            return Ok(Page::default());
        }
        let limit = u64::from(self.page_size).min(self.max_results - offset);

        tracing::debug!(
            endpoint = %self.endpoint,
            page,
            offset,
            limit,
            "Fetching listings page"
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(credential.token())
            .query(&[
                ("term", query.category.as_str()),
                ("location", query.location.as_str()),
            ])
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response.bytes().await.map_err(FetchError::from)?;
        let decoded: SearchResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::decode(format!("unexpected response body: {e}")))?;

        let received = decoded.businesses.len() as u64;
        let end = offset + received;
        let has_more = received == limit
            && decoded.total.is_none_or(|total| end < total)
            && end < self.max_results;

        tracing::debug!(
            page,
            received,
            total = ?decoded.total,
            has_more,
            "Listings page decoded"
        );

        Ok(Page {
            records: decoded.businesses,
            has_more,
            total: decoded.total,
        })
    }
}

/// Map a non-success status (and its body) onto the fetch error taxonomy
fn status_error(status: StatusCode, body: &str) -> FetchError {
    let message = error_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized { message },
        _ => FetchError::ServerError {
            status: status.as_u16(),
            message,
        },
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        match (parsed.error.code, parsed.error.description) {
            (Some(code), Some(description)) => return format!("{code}: {description}"),
            (None, Some(description)) => return description,
            (Some(code), None) => return code,
            (None, None) => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status.to_string();
    }
    let excerpt: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    format!("{status}: {excerpt}")
}
