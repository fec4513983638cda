/// Persistence contract for core state.
///
/// Whatever backs it (a JSON file, a database row, memory) must hand back
/// exactly what was last saved so registries can be rebuilt on restart with
/// the same ids.
pub trait SnapshotStore<S> {
    /// Returns `None` when nothing has been saved yet.
    fn load(&self) -> anyhow::Result<Option<S>>;

    fn save(&self, snapshot: &S) -> anyhow::Result<()>;
}
