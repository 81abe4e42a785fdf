pub mod image;
pub mod ocr;
pub mod regions;

pub use self::image::ImageProcessor;
pub use ocr::{build_backends, OcrBackend, RawRead};
pub use regions::{RegionCandidate, RegionDetector};
