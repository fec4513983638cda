use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One item as delivered by a fetch collaborator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub snippet: Option<String>,
    /// ISO-8601 string, date-only values are allowed.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl RawItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// A batch of raw items for a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchBatch {
    pub source_id: Uuid,
    pub items: Vec<RawItem>,
}

/// Identity handed to the core by the session collaborator.
///
/// The core never validates it; it is only used as a map key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

// Collaborator note:
// Implementations of these traits live outside the core (HTTP fetchers,
// login screens). The core only consumes what they hand over, so keep them
// free of any aggregation logic.

/// Source of raw batches, e.g. a poller that downloads and parses feeds.
pub trait FetchSource {
    /// Human-readable name used in logs.
    fn name(&self) -> String;

    /// Returns the batches gathered since the last call.
    fn pull(&mut self) -> anyhow::Result<Vec<FetchBatch>>;
}

/// Supplies the signed-in user, if any.
pub trait SessionProvider {
    fn current_user(&self) -> Option<UserId>;
}
