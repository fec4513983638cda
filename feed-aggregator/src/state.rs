use crate::bookmarks::Bookmark;
use crate::types::{ContentItem, Source};
use anyhow::Context;
use interfaces::state::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to rebuild the client after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub sources: Vec<Source>,
    #[serde(default)]
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub bookmarks: Vec<Bookmark>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            sources: Vec::new(),
            items: Vec::new(),
            bookmarks: Vec::new(),
        }
    }
}

/// Snapshot persisted as pretty-printed JSON on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // One temp file per save
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

impl SnapshotStore<Snapshot> for JsonFileStore {
    fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        info!(
            "Loaded snapshot from {} ({} sources, {} items, {} bookmarks)",
            self.path.display(),
            snapshot.sources.len(),
            snapshot.items.len(),
            snapshot.bookmarks.len()
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let temp = self.temp_path();

        // Write then rename so readers never observe a half-written file
        fs::write(&temp, json).with_context(|| format!("writing {}", temp.display()))?;
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e).with_context(|| format!("replacing {}", self.path.display()));
        }

        info!("Saved snapshot to {}", self.path.display());
        Ok(())
    }
}

/// Keeps the last saved snapshot in memory.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore<Snapshot> for MemoryStore {
    fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
