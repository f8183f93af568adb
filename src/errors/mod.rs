pub mod types;
pub mod classification;

pub use types::{EntityKind, StatusError};
pub use classification::ErrorClassification;
