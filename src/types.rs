//! Core types for listing-collector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Category assigned when the source reports none
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Export column headers, in contract order
pub const CSV_HEADERS: [&str; 8] = [
    "Name",
    "Category",
    "Address",
    "City",
    "Province",
    "PostalCode",
    "Phone",
    "URL",
];

/// A collection query, immutable once a run starts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Business category or search term (e.g., "Restaurants")
    pub category: String,
    /// Location to search in (e.g., "Toronto, ON")
    pub location: String,
}

impl Query {
    /// Create a query from a category and a location
    pub fn new(category: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            location: location.into(),
        }
    }

    /// Return a copy with surrounding whitespace removed
    pub fn trimmed(&self) -> Self {
        Self {
            category: self.category.trim().to_string(),
            location: self.location.trim().to_string(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in '{}'", self.category, self.location)
    }
}

/// Geographic position of a listing
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Canonical business record produced by the normalizer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessListing {
    /// Opaque unique identifier, generated at normalization time
    pub id: Uuid,
    /// Business name
    pub name: String,
    /// First category reported by the source, or [`UNCATEGORIZED`]
    pub category: String,
    /// Street address (may be empty)
    pub address: String,
    /// City
    pub city: String,
    /// Province or state (may be empty)
    pub province: String,
    /// Postal or zip code (may be empty)
    pub postal_code: String,
    /// Phone number (may be empty)
    pub phone: String,
    /// Listing URL
    pub url: Option<String>,
    /// Position; latitude and longitude are always present together
    pub coordinates: Option<Coordinates>,
}

impl BusinessListing {
    /// Latitude, if the listing has coordinates
    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    /// Longitude, if the listing has coordinates
    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }

    /// Single-line postal address
    pub fn full_address(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.address, self.city, self.province, self.postal_code
        )
    }

    /// Export fields in the order of [`CSV_HEADERS`]
    pub fn csv_row(&self) -> [&str; 8] {
        [
            &self.name,
            &self.category,
            &self.address,
            &self.city,
            &self.province,
            &self.postal_code,
            &self.phone,
            self.url.as_deref().unwrap_or(""),
        ]
    }
}

/// Lifecycle state of a collection controller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run has been started yet
    #[default]
    Idle,
    /// The fetch loop is active
    Running,
    /// The fetch loop is parked until resumed or stopped
    Paused,
    /// The run ended, by request or because the source was exhausted
    Stopped,
    /// The run ended because of a fatal source error
    Failed,
}

impl RunState {
    /// Whether a run is in progress (running or paused)
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }

    /// Whether the run has reached a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle | Stopped | Failed, Running)
                | (Running, Paused | Stopped | Failed)
                // The fetch in flight when a pause arrived can still fail
                | (Paused, Running | Stopped | Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress of the current run
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Progress {
    /// Fraction of estimated pages completed, in `[0, 1]`
    Determinate {
        /// Completed fraction
        fraction: f64,
    },
    /// The source did not report a total; only a page counter is available
    Indeterminate {
        /// Pages fetched so far
        pages_fetched: u32,
    },
}

impl Default for Progress {
    fn default() -> Self {
        Progress::Determinate { fraction: 0.0 }
    }
}

impl Progress {
    /// Fraction if known
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Progress::Determinate { fraction } => Some(*fraction),
            Progress::Indeterminate { .. } => None,
        }
    }
}

/// Consistent read-only view of a run's accumulated state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    /// Current run state
    pub state: RunState,
    /// Query of the current or last run
    pub query: Option<Query>,
    /// Listings in insertion (page fetch) order
    pub listings: Vec<BusinessListing>,
    /// Always equal to `listings.len()`
    pub collected_count: usize,
    /// Pages successfully fetched in this run
    pub pages_fetched: u32,
    /// Run progress
    pub progress: Progress,
    /// One-line human-readable status
    pub status_message: String,
    /// Append-only activity log of this run
    pub log_messages: Vec<String>,
    /// Human-readable message of the error that failed the run
    pub last_error: Option<String>,
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

/// Event emitted by the controller during a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The run state changed
    StateChanged {
        /// Previous state
        from: RunState,
        /// New state
        to: RunState,
    },

    /// A page was fetched and its listings appended
    PageFetched {
        /// Zero-based page index
        page: u32,
        /// Listings on this page
        records: usize,
        /// Listings collected so far in this run
        collected: usize,
    },

    /// A transient page failure will be retried
    Retrying {
        /// Zero-based page index
        page: u32,
        /// Retry number, starting at 1
        attempt: u32,
        /// Retry budget for the page
        max_attempts: u32,
        /// Backoff before the retry
        delay_ms: u64,
        /// The error that triggered the retry
        error: String,
    },

    /// The source was exhausted or the page limit reached
    Completed {
        /// Listings collected
        collected: usize,
        /// Pages fetched
        pages: u32,
    },

    /// The run failed
    Failed {
        /// Error message
        error: String,
    },

    /// A line was appended to the activity log
    Log {
        /// The log line
        message: String,
    },
}
