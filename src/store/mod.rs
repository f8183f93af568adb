pub mod manager;
pub mod persist;

pub use manager::{RunHandle, StatusStore};
pub use persist::{read_snapshot, SnapshotWriter};
