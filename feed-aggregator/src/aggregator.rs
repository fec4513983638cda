use crate::rss_utils::time::parse_published_at;
use crate::rss_utils::url::normalize_item_url;
use crate::source_registry::SourceRegistry;
use crate::traits::{SourceEvent, SourceObserver};
use crate::types::{
    ClientConfig, ContentItem, FeedError, IngestResult, ItemId, RawItem, Result, Source, SourceId,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Items attributed to one source.
struct SourceItems {
    active: bool,
    base_url: Option<Url>,
    items: Vec<ContentItem>,
    // normalized url -> position in `items`
    by_url: HashMap<String, usize>,
}

impl SourceItems {
    fn new(source: &Source) -> Self {
        Self {
            active: source.is_active,
            base_url: Url::parse(&source.url).ok(),
            items: Vec::new(),
            by_url: HashMap::new(),
        }
    }
}

type Partition = Arc<RwLock<SourceItems>>;

/// A raw record that passed validation.
struct PreparedItem {
    url: String,
    title: String,
    snippet: String,
    published_at: Option<DateTime<Utc>>,
    image_url: Option<String>,
}

/// De-duplicated collection of content items, partitioned by source.
///
/// Each partition has its own lock, so ingests for one source are
/// serialized while different sources proceed independently.
pub struct FeedAggregator {
    registry: Arc<SourceRegistry>,
    partitions: RwLock<Vec<(SourceId, Partition)>>,
    max_batch_size: usize,
    allowed_schemes: Vec<String>,
}

impl FeedAggregator {
    /// Create an aggregator and subscribe it to `registry` events.
    pub fn attach(registry: Arc<SourceRegistry>, config: &ClientConfig) -> Arc<Self> {
        let aggregator = Arc::new(Self {
            registry: Arc::clone(&registry),
            partitions: RwLock::new(Vec::new()),
            max_batch_size: config.max_batch_size,
            allowed_schemes: config.allowed_schemes.clone(),
        });

        let observer: Arc<dyn SourceObserver> = aggregator.clone();
        registry.subscribe(Arc::downgrade(&observer));

        for source in registry.list_sources() {
            aggregator.open_partition(&source);
        }

        aggregator
    }

    /// Merge a batch of raw records for one source, all or nothing.
    pub fn ingest(&self, source_id: SourceId, items: &[RawItem]) -> Result<IngestResult> {
        if items.len() > self.max_batch_size {
            return Err(FeedError::MalformedItem {
                index: self.max_batch_size,
                reason: format!(
                    "batch of {} items exceeds the limit of {}",
                    items.len(),
                    self.max_batch_size
                ),
            });
        }

        let partition = self
            .partition(source_id)
            .ok_or(FeedError::UnknownSource { id: source_id })?;
        let mut partition = partition.write().unwrap_or_else(PoisonError::into_inner);

        // Validate everything before touching the partition
        let prepared = prepare_batch(partition.base_url.as_ref(), items, &self.allowed_schemes)?;

        let fetched_at = Utc::now();
        let mut created = 0;
        let mut updated = 0;

        for item in prepared {
            match partition.by_url.get(&item.url).copied() {
                Some(position) => {
                    let existing = &mut partition.items[position];
                    existing.title = item.title;
                    existing.snippet = item.snippet;
                    existing.published_at = item.published_at;
                    existing.image_url = item.image_url;
                    updated += 1;
                }
                None => {
                    let position = partition.items.len();
                    partition.by_url.insert(item.url.clone(), position);
                    partition.items.push(ContentItem {
                        id: Uuid::new_v4(),
                        source_id,
                        title: item.title,
                        snippet: item.snippet,
                        url: item.url,
                        published_at: item.published_at,
                        image_url: item.image_url,
                    });
                    created += 1;
                }
            }
        }

        let item_count = partition.items.len();

        // The partition is detached if the source was removed mid-ingest
        self.registry
            .update_fetch_result(source_id, item_count, Some(fetched_at))
            .map_err(|_| FeedError::UnknownSource { id: source_id })?;

        info!(
            "Source {}: ingested {} records, {} new, {} updated, {} total",
            source_id,
            items.len(),
            created,
            updated,
            item_count
        );

        Ok(IngestResult {
            source_id,
            created,
            updated,
            item_count,
            fetched_at,
        })
    }

    /// Items of active sources. Order is not meaningful.
    pub fn current_view(&self) -> Vec<ContentItem> {
        let partitions = self.read_partitions();
        let mut view = Vec::new();

        for (_, partition) in partitions.iter() {
            let partition = partition.read().unwrap_or_else(PoisonError::into_inner);
            if partition.active {
                view.extend(partition.items.iter().cloned());
            }
        }

        view
    }

    /// Every stored item, including those of inactive sources.
    pub fn all_items(&self) -> Vec<ContentItem> {
        let partitions = self.read_partitions();
        let mut items = Vec::new();

        for (_, partition) in partitions.iter() {
            let partition = partition.read().unwrap_or_else(PoisonError::into_inner);
            items.extend(partition.items.iter().cloned());
        }

        items
    }

    /// Items attributed to one source, regardless of its state.
    pub fn items_for_source(&self, source_id: SourceId) -> Result<Vec<ContentItem>> {
        let partition = self
            .partition(source_id)
            .ok_or(FeedError::SourceNotFound { id: source_id })?;
        let partition = partition.read().unwrap_or_else(PoisonError::into_inner);
        Ok(partition.items.clone())
    }

    /// Look up a visible item. Hidden or purged ids yield `None`.
    pub fn get_item(&self, item_id: ItemId) -> Option<ContentItem> {
        let partitions = self.read_partitions();

        partitions.iter().find_map(|(_, partition)| {
            let partition = partition.read().unwrap_or_else(PoisonError::into_inner);
            if !partition.active {
                return None;
            }
            partition.items.iter().find(|item| item.id == item_id).cloned()
        })
    }

    pub fn total_items(&self) -> usize {
        self.count_items(|_| true)
    }

    pub fn visible_items(&self) -> usize {
        self.count_items(|active| active)
    }

    /// Load persisted items. Items whose source is not registered, or whose
    /// id or dedup key was already seen, are dropped. Returns the number kept.
    pub fn restore_items(&self, items: Vec<ContentItem>) -> usize {
        let mut seen_ids: HashSet<ItemId> = HashSet::new();
        let mut kept = 0;

        for item in items {
            let Some(partition) = self.partition(item.source_id) else {
                warn!(
                    "Dropping item {} for unregistered source {}",
                    item.id, item.source_id
                );
                continue;
            };

            if !seen_ids.insert(item.id) {
                warn!("Dropping item with duplicate id {}", item.id);
                continue;
            }

            let mut partition = partition.write().unwrap_or_else(PoisonError::into_inner);
            if partition.by_url.contains_key(&item.url) {
                warn!("Dropping duplicate item {} ({})", item.id, item.url);
                continue;
            }

            let position = partition.items.len();
            partition.by_url.insert(item.url.clone(), position);
            partition.items.push(item);
            kept += 1;
        }

        // Counts are derived, never trusted from storage
        for (source_id, partition) in self.read_partitions().iter() {
            let count = partition
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .items
                .len();
            if let Err(e) = self.registry.update_fetch_result(*source_id, count, None) {
                warn!("Failed to record item count for {}: {}", source_id, e);
            }
        }

        info!("Restored {} items", kept);
        kept
    }

    fn count_items(&self, include: impl Fn(bool) -> bool) -> usize {
        self.read_partitions()
            .iter()
            .map(|(_, partition)| {
                let partition = partition.read().unwrap_or_else(PoisonError::into_inner);
                if include(partition.active) {
                    partition.items.len()
                } else {
                    0
                }
            })
            .sum()
    }

    fn partition(&self, source_id: SourceId) -> Option<Partition> {
        self.read_partitions()
            .iter()
            .find(|(id, _)| *id == source_id)
            .map(|(_, partition)| Arc::clone(partition))
    }

    fn open_partition(&self, source: &Source) {
        let mut partitions = self.write_partitions();
        if partitions.iter().any(|(id, _)| *id == source.id) {
            return;
        }
        partitions.push((source.id, Arc::new(RwLock::new(SourceItems::new(source)))));
        debug!("Opened item partition for source {}", source.id);
    }

    fn set_partition_active(&self, source_id: SourceId, active: bool) {
        match self.partition(source_id) {
            Some(partition) => {
                partition.write().unwrap_or_else(PoisonError::into_inner).active = active;
            }
            None => warn!("Activation change for unknown source {}", source_id),
        }
    }

    fn purge_partition(&self, source_id: SourceId) {
        let removed = {
            let mut partitions = self.write_partitions();
            let position = partitions.iter().position(|(id, _)| *id == source_id);
            position.map(|position| partitions.remove(position).1)
        };

        if let Some(partition) = removed {
            let purged = partition
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .items
                .len();
            info!("Purged {} items of removed source {}", purged, source_id);
        }
    }

    fn read_partitions(&self) -> RwLockReadGuard<'_, Vec<(SourceId, Partition)>> {
        self.partitions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_partitions(&self) -> RwLockWriteGuard<'_, Vec<(SourceId, Partition)>> {
        self.partitions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SourceObserver for FeedAggregator {
    fn on_source_event(&self, event: &SourceEvent) {
        match event {
            SourceEvent::Added(source) => self.open_partition(source),
            SourceEvent::Updated(source) => {
                if let Some(partition) = self.partition(source.id) {
                    partition.write().unwrap_or_else(PoisonError::into_inner).base_url =
                        Url::parse(&source.url).ok();
                }
            }
            SourceEvent::Activated(id) => self.set_partition_active(*id, true),
            SourceEvent::Deactivated(id) => self.set_partition_active(*id, false),
            SourceEvent::Removed(id) => self.purge_partition(*id),
        }
    }
}

/// Validate and normalize a batch. Later duplicates of a url replace earlier
/// ones but keep the first position.
fn prepare_batch(
    base_url: Option<&Url>,
    items: &[RawItem],
    allowed_schemes: &[String],
) -> Result<Vec<PreparedItem>> {
    let mut prepared: Vec<PreparedItem> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, raw) in items.iter().enumerate() {
        let title = raw.title.trim();
        if title.is_empty() {
            return Err(FeedError::MalformedItem {
                index,
                reason: "missing title".to_string(),
            });
        }

        let url = normalize_item_url(base_url, &raw.url, allowed_schemes)
            .map_err(|reason| FeedError::MalformedItem { index, reason })?;

        let published_at = match raw.published_at.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => {
                let parsed = parse_published_at(value);
                if parsed.is_none() {
                    warn!("Ignoring unparseable publish time {:?} for {}", value, url);
                }
                parsed
            }
            _ => None,
        };

        let item = PreparedItem {
            title: title.to_string(),
            snippet: raw.snippet.as_deref().map(str::trim).unwrap_or("").to_string(),
            published_at,
            image_url: raw
                .image_url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            url,
        };

        match positions.get(&item.url).copied() {
            Some(position) => prepared[position] = item,
            None => {
                positions.insert(item.url.clone(), prepared.len());
                prepared.push(item);
            }
        }
    }

    Ok(prepared)
}
