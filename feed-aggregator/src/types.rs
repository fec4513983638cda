use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;
// Boundary records shared with collaborators
pub use interfaces::defs::{FetchBatch, RawItem, UserId};

pub type SourceId = Uuid;
pub type ItemId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: SourceId,
    /// Normalized absolute URL; unique among active sources.
    pub url: String,
    pub name: String,
    pub is_active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Number of items attributed to this source after de-duplication.
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: ItemId,
    pub source_id: SourceId,
    pub title: String,
    pub snippet: String,
    /// Normalized URL, the per-source dedup key.
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// Partial update for a source. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePatch {
    pub name: Option<String>,
    pub url: Option<String>,
}

impl SourcePatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub source_id: SourceId,
    pub created: usize,
    pub updated: usize,
    /// Items attributed to the source after this batch was merged.
    pub item_count: usize,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortOrder {
    type Err = FeedError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            other => Err(FeedError::General(format!("Unknown sort order: {}", other))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Newest => f.write_str("newest"),
            Self::Oldest => f.write_str("oldest"),
        }
    }
}

/// A content item decorated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub item: ContentItem,
    pub source_name: String,
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub total_sources: usize,
    pub active_sources: usize,
    pub inactive_sources: usize,
    pub never_fetched: usize,
    pub total_items: usize,
    pub visible_items: usize,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub allowed_schemes: Vec<String>,
    pub default_sort: SortOrder,
    pub snapshot_path: Option<PathBuf>,
    /// Upper bound on records per ingest call.
    pub max_batch_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            default_sort: SortOrder::Newest,
            snapshot_path: None,
            max_batch_size: 1000,
        }
    }
}

impl ClientConfig {
    /// Builds a config from `FEED_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let allowed_schemes = env::var("FEED_ALLOWED_SCHEMES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|scheme| scheme.trim().to_ascii_lowercase())
                    .filter(|scheme| !scheme.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|schemes| !schemes.is_empty())
            .unwrap_or(defaults.allowed_schemes);

        let default_sort = env::var("FEED_DEFAULT_SORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.default_sort);

        let snapshot_path = env::var("FEED_SNAPSHOT_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .or(defaults.snapshot_path);

        let max_batch_size = env::var("FEED_MAX_BATCH_SIZE")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.max_batch_size);

        Self {
            allowed_schemes,
            default_sort,
            snapshot_path,
            max_batch_size,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("An active source already uses {url}")]
    DuplicateSource { url: String },

    #[error("Source not found: {id}")]
    SourceNotFound { id: SourceId },

    #[error("Ingest against unregistered source: {id}")]
    UnknownSource { id: SourceId },

    #[error("Malformed item at index {index}: {reason}")]
    MalformedItem { index: usize, reason: String },

    #[error("Source {id} can only be removed together with its items")]
    CascadeRequired { id: SourceId },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
