pub mod types;
pub mod rss_utils;
pub mod traits;
pub mod source_registry;
pub mod aggregator;
pub mod query;
pub mod bookmarks;
pub mod state;
pub mod client;
pub mod pipeline;
pub mod sources;

pub use types::*;
pub use traits::{SourceEvent, SourceObserver};
pub use source_registry::SourceRegistry;
pub use aggregator::FeedAggregator;
pub use query::{query, Query};
pub use bookmarks::{Bookmark, BookmarkStore};
pub use state::{JsonFileStore, MemoryStore, Snapshot, SNAPSHOT_VERSION};
pub use client::FeedClient;
pub use pipeline::{forward_batches, run_ingest_loop, IngestSummary};
pub use sources::StaticFetchSource;
