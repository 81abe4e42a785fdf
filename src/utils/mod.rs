pub mod config;
pub mod error;

pub use config::{BackendToggles, ConfidenceBoost, ExtractorConfig};
pub use error::PlateError;
