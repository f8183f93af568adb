pub mod state;
pub mod phase;
pub mod snapshot;
pub mod metrics;

pub use state::{Applied, Lifecycle, RunModel, RunOutcome, StatusKind};
pub use phase::{default_stages, validate_topology, StageConfig};
pub use snapshot::{AgentView, RunSnapshot, RunView, StageView};
pub use metrics::{estimate, ProgressEstimate};
