use crate::rss_utils::url::{extract_domain, normalize_source_url};
use crate::traits::{SourceEvent, SourceObserver};
use crate::types::{ClientConfig, FeedError, Result, Source, SourceId, SourcePatch};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
struct RegistryState {
    sources: HashMap<SourceId, Source>,
    // Registration order, used for listing
    order: Vec<SourceId>,
}

impl RegistryState {
    fn active_url_owner(&self, url: &str, except: Option<SourceId>) -> Option<SourceId> {
        self.sources
            .values()
            .find(|source| source.is_active && source.url == url && Some(source.id) != except)
            .map(|source| source.id)
    }
}

/// Owner of all subscribed sources.
///
/// Mutations are serialized; observers are notified before the mutating
/// call returns.
pub struct SourceRegistry {
    state: RwLock<RegistryState>,
    observers: RwLock<Vec<Weak<dyn SourceObserver>>>,
    mutations: Mutex<()>,
    allowed_schemes: Vec<String>,
}

impl SourceRegistry {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            observers: RwLock::new(Vec::new()),
            mutations: Mutex::new(()),
            allowed_schemes: config.allowed_schemes.clone(),
        }
    }

    /// Rebuild a registry from persisted records, keeping their ids.
    pub fn restore(config: &ClientConfig, mut sources: Vec<Source>) -> Result<Self> {
        let registry = Self::new(config);
        // Stable, so snapshot order survives equal timestamps
        sources.sort_by_key(|source| source.created_at);

        {
            let mut state = registry.write_state();
            for mut source in sources {
                if state.sources.contains_key(&source.id) {
                    return Err(FeedError::General(format!(
                        "Duplicate source id in snapshot: {}",
                        source.id
                    )));
                }

                source.url = registry.normalize(&source.url)?;
                if source.is_active && state.active_url_owner(&source.url, None).is_some() {
                    return Err(FeedError::DuplicateSource { url: source.url });
                }

                state.order.push(source.id);
                state.sources.insert(source.id, source);
            }
            info!("Restored {} sources", state.order.len());
        }

        Ok(registry)
    }

    /// Register an observer. Only a weak handle is kept.
    pub fn subscribe(&self, observer: Weak<dyn SourceObserver>) {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        observers.push(observer);
    }

    pub fn add_source(&self, url: &str, name: Option<&str>) -> Result<Source> {
        let _serialized = self.lock_mutations();
        let url = self.normalize(url)?;

        let source = {
            let mut state = self.write_state();
            if state.active_url_owner(&url, None).is_some() {
                return Err(FeedError::DuplicateSource { url });
            }

            let now = Utc::now();
            let source = Source {
                id: Uuid::new_v4(),
                name: resolve_name(name, &url),
                url,
                is_active: true,
                last_fetched_at: None,
                item_count: 0,
                created_at: now,
                updated_at: now,
            };
            state.order.push(source.id);
            state.sources.insert(source.id, source.clone());
            source
        };

        info!("Added new source: {} with ID: {}", source.url, source.id);
        self.emit(SourceEvent::Added(source.clone()));
        Ok(source)
    }

    pub fn update_source(&self, id: SourceId, patch: SourcePatch) -> Result<Source> {
        let _serialized = self.lock_mutations();

        let updated = {
            let mut state = self.write_state();
            let current = state
                .sources
                .get(&id)
                .cloned()
                .ok_or(FeedError::SourceNotFound { id })?;
            let mut next = current.clone();

            if let Some(raw_url) = patch.url.as_deref() {
                let url = self.normalize(raw_url)?;
                if next.is_active && state.active_url_owner(&url, Some(id)).is_some() {
                    return Err(FeedError::DuplicateSource { url });
                }
                next.url = url;
            }

            if let Some(name) = patch.name.as_deref() {
                next.name = resolve_name(Some(name), &next.url);
            }

            if next == current {
                debug!("Update for source {} changed nothing", id);
                return Ok(current);
            }

            next.updated_at = Utc::now();
            state.sources.insert(id, next.clone());
            next
        };

        info!("Updated source {}: name={:?} url={}", id, updated.name, updated.url);
        self.emit(SourceEvent::Updated(updated.clone()));
        Ok(updated)
    }

    /// Toggle visibility of a source. Setting the current state is a no-op.
    pub fn set_active(&self, id: SourceId, active: bool) -> Result<()> {
        let _serialized = self.lock_mutations();

        let event = {
            let mut state = self.write_state();
            let (is_active, url) = state
                .sources
                .get(&id)
                .map(|source| (source.is_active, source.url.clone()))
                .ok_or(FeedError::SourceNotFound { id })?;

            if is_active == active {
                return Ok(());
            }

            // Reactivation must not create a second active subscription
            if active && state.active_url_owner(&url, Some(id)).is_some() {
                return Err(FeedError::DuplicateSource { url });
            }

            if let Some(source) = state.sources.get_mut(&id) {
                source.is_active = active;
                source.updated_at = Utc::now();
            }

            if active {
                SourceEvent::Activated(id)
            } else {
                SourceEvent::Deactivated(id)
            }
        };

        info!("{} source: {}", if active { "Activated" } else { "Deactivated" }, id);
        self.emit(event);
        Ok(())
    }

    /// Remove a source. Only cascading removal is supported: keeping items
    /// whose source no longer resolves would break referential integrity.
    ///
    /// Observers see `Removed` while the record still exists, so attributed
    /// items are gone before the source stops resolving.
    pub fn remove_source(&self, id: SourceId, cascade: bool) -> Result<Source> {
        let _serialized = self.lock_mutations();

        {
            let state = self.read_state();
            if !state.sources.contains_key(&id) {
                return Err(FeedError::SourceNotFound { id });
            }
            if !cascade {
                return Err(FeedError::CascadeRequired { id });
            }
        }

        self.emit(SourceEvent::Removed(id));

        let removed = {
            let mut state = self.write_state();
            state.order.retain(|existing| *existing != id);
            state
                .sources
                .remove(&id)
                .ok_or(FeedError::SourceNotFound { id })?
        };

        info!("Removed source: {} ({})", removed.id, removed.url);
        Ok(removed)
    }

    /// Remove every source with cascade. Returns how many were removed.
    pub fn remove_all_sources(&self) -> usize {
        let ids: Vec<SourceId> = self.read_state().order.clone();
        let mut removed = 0;

        for id in ids {
            // A concurrent removal may have won already
            if self.remove_source(id, true).is_ok() {
                removed += 1;
            }
        }

        info!("Removed all sources ({} total)", removed);
        removed
    }

    pub fn get_source(&self, id: SourceId) -> Result<Source> {
        self.read_state()
            .sources
            .get(&id)
            .cloned()
            .ok_or(FeedError::SourceNotFound { id })
    }

    /// All sources in registration order.
    pub fn list_sources(&self) -> Vec<Source> {
        let state = self.read_state();
        state
            .order
            .iter()
            .filter_map(|id| state.sources.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_state().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the outcome of an ingest. Bookkeeping only, emits no event.
    ///
    /// `fetched_at = None` keeps the previous fetch time (used on restore).
    pub(crate) fn update_fetch_result(
        &self,
        id: SourceId,
        item_count: usize,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.write_state();
        let source = state
            .sources
            .get_mut(&id)
            .ok_or(FeedError::SourceNotFound { id })?;

        source.item_count = item_count;
        if let Some(fetched_at) = fetched_at {
            source.last_fetched_at = Some(fetched_at);
        }

        debug!("Source {} now has {} items", id, item_count);
        Ok(())
    }

    fn normalize(&self, raw: &str) -> Result<String> {
        normalize_source_url(raw, &self.allowed_schemes)
            .map(|url| url.to_string())
            .map_err(|reason| FeedError::InvalidUrl {
                url: raw.trim().to_string(),
                reason,
            })
    }

    fn emit(&self, event: SourceEvent) {
        let observers: Vec<Arc<dyn SourceObserver>> = {
            let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        debug!("Dispatching {:?} to {} observers", event, observers.len());
        for observer in observers {
            observer.on_source_event(&event);
        }
    }

    fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Display name: trimmed `name`, or the URL host when blank or missing.
fn resolve_name(name: Option<&str>, url: &str) -> String {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| extract_domain(url))
        .unwrap_or_else(|| url.to_string())
}
