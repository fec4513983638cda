use crate::types::{ContentItem, SortOrder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A transient view request. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub search_term: String,
    pub sort_order: SortOrder,
}

impl Query {
    pub fn new(search_term: impl Into<String>, sort_order: SortOrder) -> Self {
        Self {
            search_term: search_term.into(),
            sort_order,
        }
    }

    pub fn apply(&self, items: &[ContentItem]) -> Vec<ContentItem> {
        query(items, &self.search_term, self.sort_order)
    }
}

/// Filter by `search_term` and sort by publication time.
///
/// The input is never mutated. Items without `published_at` count as the
/// oldest possible, and ties keep their input order (the sort is stable).
pub fn query(items: &[ContentItem], search_term: &str, sort_order: SortOrder) -> Vec<ContentItem> {
    let needle = search_term.trim().to_lowercase();

    let mut matched: Vec<ContentItem> = items
        .iter()
        .filter(|item| matches_term(item, &needle))
        .cloned()
        .collect();

    matched.sort_by(|a, b| compare_published(a, b, sort_order));
    matched
}

/// `needle` must already be trimmed and lowercased. Empty matches everything.
pub fn matches_term(item: &ContentItem, needle: &str) -> bool {
    needle.is_empty()
        || item.title.to_lowercase().contains(needle)
        || item.snippet.to_lowercase().contains(needle)
}

// `None < Some(_)` for Option, which is exactly "missing is oldest".
fn compare_published(a: &ContentItem, b: &ContentItem, sort_order: SortOrder) -> Ordering {
    match sort_order {
        SortOrder::Newest => b.published_at.cmp(&a.published_at),
        SortOrder::Oldest => a.published_at.cmp(&b.published_at),
    }
}
