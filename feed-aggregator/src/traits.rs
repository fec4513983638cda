use crate::types::{Source, SourceId};

/// Lifecycle change published by the source registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Added(Source),
    Updated(Source),
    Activated(SourceId),
    Deactivated(SourceId),
    /// Emitted only for cascading removal, before the record is dropped, so
    /// observers purge attributed items first.
    Removed(SourceId),
}

impl SourceEvent {
    pub fn source_id(&self) -> SourceId {
        match self {
            Self::Added(source) | Self::Updated(source) => source.id,
            Self::Activated(id) | Self::Deactivated(id) | Self::Removed(id) => *id,
        }
    }
}

/// Receiver of registry lifecycle events.
///
/// Called synchronously before the mutating call returns to its caller.
/// `Removed` arrives while the source still resolves; every other event
/// arrives after the change is committed.
pub trait SourceObserver: Send + Sync {
    fn on_source_event(&self, event: &SourceEvent);
}
