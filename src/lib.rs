//! Live status tracking for multi-stage agent pipelines: a shared store
//! that workers report into, progress estimation, and a terminal view.

pub mod cli;
pub mod clock;
pub mod config;
pub mod display;
pub mod errors;
pub mod pipeline;
pub mod store;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::StatusError;
pub use pipeline::{RunSnapshot, StageConfig};
pub use store::StatusStore;
