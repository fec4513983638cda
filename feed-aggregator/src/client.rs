use crate::aggregator::FeedAggregator;
use crate::bookmarks::{Bookmark, BookmarkStore};
use crate::query::Query;
use crate::source_registry::SourceRegistry;
use crate::state::{Snapshot, SNAPSHOT_VERSION};
use crate::types::{
    ClientConfig, ContentItem, FeedEntry, FeedError, FeedStats, FetchBatch, IngestResult, ItemId,
    RawItem, Result, Source, SourceId, SourcePatch, UserId,
};
use interfaces::state::SnapshotStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point for the view layer: sources, aggregation, queries and bookmarks.
pub struct FeedClient {
    config: ClientConfig,
    registry: Arc<SourceRegistry>,
    aggregator: Arc<FeedAggregator>,
    bookmarks: BookmarkStore,
}

impl FeedClient {
    pub fn new(config: ClientConfig) -> Self {
        let registry = Arc::new(SourceRegistry::new(&config));
        let aggregator = FeedAggregator::attach(Arc::clone(&registry), &config);

        Self {
            config,
            registry,
            aggregator,
            bookmarks: BookmarkStore::new(),
        }
    }

    /// Rebuild a client from a snapshot, keeping every id.
    pub fn restore(config: ClientConfig, snapshot: Snapshot) -> Result<Self> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(FeedError::Persistence(format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let registry = Arc::new(SourceRegistry::restore(&config, snapshot.sources)?);
        let aggregator = FeedAggregator::attach(Arc::clone(&registry), &config);

        let offered = snapshot.items.len();
        let kept = aggregator.restore_items(snapshot.items);
        if kept < offered {
            warn!("Dropped {} items while restoring snapshot", offered - kept);
        }

        Ok(Self {
            config,
            registry,
            aggregator,
            bookmarks: BookmarkStore::restore(snapshot.bookmarks),
        })
    }

    /// Load from `store`, or start empty if nothing was saved yet.
    pub fn load<S: SnapshotStore<Snapshot>>(config: ClientConfig, store: &S) -> Result<Self> {
        let snapshot = store
            .load()
            .map_err(|e| FeedError::Persistence(format!("{:#}", e)))?;

        match snapshot {
            Some(snapshot) => Self::restore(config, snapshot),
            None => {
                info!("No saved state found, starting empty");
                Ok(Self::new(config))
            }
        }
    }

    pub fn save<S: SnapshotStore<Snapshot>>(&self, store: &S) -> Result<()> {
        store
            .save(&self.snapshot())
            .map_err(|e| FeedError::Persistence(format!("{:#}", e)))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            sources: self.registry.list_sources(),
            items: self.aggregator.all_items(),
            bookmarks: self.bookmarks.all_bookmarks(),
        }
    }

    pub fn registry(&self) -> Arc<SourceRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn aggregator(&self) -> Arc<FeedAggregator> {
        Arc::clone(&self.aggregator)
    }

    // Sources

    pub fn add_source(&self, url: &str, name: Option<&str>) -> Result<Source> {
        self.registry.add_source(url, name)
    }

    pub fn update_source(&self, id: SourceId, patch: SourcePatch) -> Result<Source> {
        self.registry.update_source(id, patch)
    }

    pub fn set_active(&self, id: SourceId, active: bool) -> Result<()> {
        self.registry.set_active(id, active)
    }

    pub fn remove_source(&self, id: SourceId, cascade: bool) -> Result<Source> {
        self.registry.remove_source(id, cascade)
    }

    pub fn remove_all_sources(&self) -> usize {
        self.registry.remove_all_sources()
    }

    pub fn get_source(&self, id: SourceId) -> Result<Source> {
        self.registry.get_source(id)
    }

    pub fn list_sources(&self) -> Vec<Source> {
        self.registry.list_sources()
    }

    // Aggregation

    pub fn ingest(&self, source_id: SourceId, items: &[RawItem]) -> Result<IngestResult> {
        self.aggregator.ingest(source_id, items)
    }

    pub fn ingest_batch(&self, batch: &FetchBatch) -> Result<IngestResult> {
        self.aggregator.ingest(batch.source_id, &batch.items)
    }

    pub fn current_view(&self) -> Vec<ContentItem> {
        self.aggregator.current_view()
    }

    /// A query over the current view using the configured default sort.
    pub fn default_query(&self, search_term: impl Into<String>) -> Query {
        Query::new(search_term, self.config.default_sort)
    }

    pub fn query(&self, query: &Query) -> Vec<ContentItem> {
        query.apply(&self.aggregator.current_view())
    }

    /// Query results decorated with source names and the user's bookmarks.
    /// Items whose source stopped resolving in the meantime are skipped.
    pub fn feed(&self, user_id: &UserId, query: &Query) -> Vec<FeedEntry> {
        let results = self.query(query);
        let names: HashMap<SourceId, String> = self
            .registry
            .list_sources()
            .into_iter()
            .map(|source| (source.id, source.name))
            .collect();
        let bookmarked = self.bookmarks.list_bookmarked(user_id);

        results
            .into_iter()
            .filter_map(|item| {
                let source_name = names.get(&item.source_id)?.clone();
                Some(FeedEntry {
                    source_name,
                    bookmarked: bookmarked.contains(&item.id),
                    item,
                })
            })
            .collect()
    }

    // Bookmarks

    pub fn bookmark(&self, user_id: &UserId, item_id: ItemId) -> bool {
        self.bookmarks.bookmark(user_id, item_id)
    }

    pub fn unbookmark(&self, user_id: &UserId, item_id: ItemId) -> bool {
        self.bookmarks.unbookmark(user_id, item_id)
    }

    pub fn is_bookmarked(&self, user_id: &UserId, item_id: ItemId) -> bool {
        self.bookmarks.is_bookmarked(user_id, item_id)
    }

    pub fn list_bookmarked(&self, user_id: &UserId) -> HashSet<ItemId> {
        self.bookmarks.list_bookmarked(user_id)
    }

    pub fn bookmarks(&self, user_id: &UserId) -> Vec<Bookmark> {
        self.bookmarks.bookmarks(user_id)
    }

    /// Bookmarked items that are still visible, oldest bookmark first.
    /// Dangling bookmarks are skipped.
    pub fn saved_items(&self, user_id: &UserId) -> Vec<ContentItem> {
        let mut visible: HashMap<ItemId, ContentItem> = self
            .aggregator
            .current_view()
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        self.bookmarks
            .bookmarks(user_id)
            .into_iter()
            .filter_map(|bookmark| visible.remove(&bookmark.item_id))
            .collect()
    }

    pub fn stats(&self) -> FeedStats {
        let sources = self.registry.list_sources();
        let active_sources = sources.iter().filter(|source| source.is_active).count();

        FeedStats {
            total_sources: sources.len(),
            active_sources,
            inactive_sources: sources.len() - active_sources,
            never_fetched: sources
                .iter()
                .filter(|source| source.last_fetched_at.is_none())
                .count(),
            total_items: self.aggregator.total_items(),
            visible_items: self.aggregator.visible_items(),
        }
    }
}

impl Default for FeedClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
