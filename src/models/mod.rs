pub mod data;
pub mod rules;

pub use data::{ApiResponse, BoundingBox, Detection, PlateFormat, PlateResult};
pub use rules::{FormatRule, PlatePatterns, PositionClass};
