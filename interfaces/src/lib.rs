pub mod defs;
pub mod state;

pub use defs::{FetchBatch, FetchSource, RawItem, SessionProvider, UserId};
pub use state::SnapshotStore;
