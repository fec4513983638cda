use crate::types::{ItemId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub created_at: DateTime<Utc>,
}

/// Per-user set of bookmarked item ids.
///
/// Only explicit user actions write here. Item ids are never checked
/// against the aggregator, so a bookmark outlives the item it points to.
#[derive(Default)]
pub struct BookmarkStore {
    bookmarks: RwLock<HashMap<UserId, HashMap<ItemId, DateTime<Utc>>>>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(bookmarks: Vec<Bookmark>) -> Self {
        let store = Self::new();
        {
            let mut map = store.write_map();
            for bookmark in bookmarks {
                // First write wins for a repeated pair
                map.entry(bookmark.user_id)
                    .or_default()
                    .entry(bookmark.item_id)
                    .or_insert(bookmark.created_at);
            }
            info!("Restored bookmarks for {} users", map.len());
        }
        store
    }

    /// Returns `true` if the pair was not bookmarked before.
    pub fn bookmark(&self, user_id: &UserId, item_id: ItemId) -> bool {
        let mut map = self.write_map();
        let items = map.entry(user_id.clone()).or_default();

        if items.contains_key(&item_id) {
            debug!("Item {} already bookmarked by {}", item_id, user_id);
            return false;
        }

        items.insert(item_id, Utc::now());
        debug!("User {} bookmarked item {}", user_id, item_id);
        true
    }

    /// Returns `true` if a bookmark was removed.
    pub fn unbookmark(&self, user_id: &UserId, item_id: ItemId) -> bool {
        let mut map = self.write_map();
        let Some(items) = map.get_mut(user_id) else {
            return false;
        };

        let removed = items.remove(&item_id).is_some();
        if items.is_empty() {
            map.remove(user_id);
        }

        if removed {
            debug!("User {} removed bookmark on item {}", user_id, item_id);
        }
        removed
    }

    pub fn is_bookmarked(&self, user_id: &UserId, item_id: ItemId) -> bool {
        self.read_map()
            .get(user_id)
            .is_some_and(|items| items.contains_key(&item_id))
    }

    /// May contain ids that no longer resolve to a live item.
    pub fn list_bookmarked(&self, user_id: &UserId) -> HashSet<ItemId> {
        self.read_map()
            .get(user_id)
            .map(|items| items.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Bookmarks of one user, oldest first.
    pub fn bookmarks(&self, user_id: &UserId) -> Vec<Bookmark> {
        let map = self.read_map();
        let mut bookmarks: Vec<Bookmark> = map
            .get(user_id)
            .map(|items| {
                items
                    .iter()
                    .map(|(item_id, created_at)| Bookmark {
                        user_id: user_id.clone(),
                        item_id: *item_id,
                        created_at: *created_at,
                    })
                    .collect()
            })
            .unwrap_or_default();

        bookmarks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        bookmarks
    }

    pub fn count(&self, user_id: &UserId) -> usize {
        self.read_map().get(user_id).map_or(0, HashMap::len)
    }

    /// Every bookmark of every user, for persistence.
    pub fn all_bookmarks(&self) -> Vec<Bookmark> {
        let mut users: Vec<UserId> = self.read_map().keys().cloned().collect();
        users.sort();

        users
            .iter()
            .flat_map(|user_id| self.bookmarks(user_id))
            .collect()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<UserId, HashMap<ItemId, DateTime<Utc>>>> {
        self.bookmarks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<UserId, HashMap<ItemId, DateTime<Utc>>>> {
        self.bookmarks.write().unwrap_or_else(PoisonError::into_inner)
    }
}
