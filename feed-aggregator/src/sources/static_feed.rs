use crate::types::{FetchBatch, RawItem, SourceId};
use interfaces::defs::FetchSource;
use std::collections::VecDeque;
use tracing::debug;

/// Fetch source that hands out pre-built batches, one per pull.
///
/// Stands in for a network poller in demos and tests.
pub struct StaticFetchSource {
    name: String,
    pending: VecDeque<FetchBatch>,
}

impl StaticFetchSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: VecDeque::new(),
        }
    }

    pub fn with_batch(mut self, source_id: SourceId, items: Vec<RawItem>) -> Self {
        self.pending.push_back(FetchBatch { source_id, items });
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }
}

impl FetchSource for StaticFetchSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn pull(&mut self) -> anyhow::Result<Vec<FetchBatch>> {
        let batch = self.pending.pop_front();
        debug!(
            "{} delivering {} batch(es), {} left",
            self.name,
            usize::from(batch.is_some()),
            self.pending.len()
        );
        Ok(batch.into_iter().collect())
    }
}
