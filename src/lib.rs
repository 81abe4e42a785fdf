pub mod models;
pub mod plate_extractor;
pub mod processing;
pub mod utils;
pub mod validation;

pub use models::{PlateFormat, PlateResult};
pub use plate_extractor::{PlateExtractor, SharedExtractor};
pub use utils::{ExtractorConfig, PlateError};
pub use validation::{spoken_to_plate_text, PlateValidator};
