use std::path::Path;
use std::sync::{Arc, Mutex};

use image::DynamicImage;

use crate::models::{Detection, PlateResult};
use crate::processing::{build_backends, ImageProcessor, OcrBackend, RegionCandidate, RegionDetector};
use crate::utils::ExtractorConfig;
use crate::validation::PlateValidator;

pub const NO_BACKEND_MESSAGE: &str = "No OCR backend available";
pub const NO_VALID_PLATE_MESSAGE: &str = "No valid plate detected";
pub const DECODE_FAILED_MESSAGE: &str = "Could not decode image";
pub const READ_FAILED_MESSAGE: &str = "Could not read image file";

/// A detection that survived validation, ready for ranking.
#[derive(Debug, Clone)]
struct Candidate {
    result: PlateResult,
    boost: f64,
}

/// PlateExtractor is the main entry point for reading a plate off a photo.
///
/// Every candidate region is rendered into each preprocessing variant and
/// every variant is read by every available backend. All reads are validated
/// with the same rules as typed plates and the most confident valid read
/// wins. Errors never escape; they come back in `PlateResult::error`.
pub struct PlateExtractor {
    backends: Vec<Box<dyn OcrBackend>>,
    detector: RegionDetector,
    config: ExtractorConfig,
}

impl PlateExtractor {
    /// Build with the backends compiled in and enabled by `config`.
    pub fn new(config: ExtractorConfig) -> Self {
        let backends = build_backends(&config);
        Self::with_backends(backends, config)
    }

    pub fn with_backends(backends: Vec<Box<dyn OcrBackend>>, config: ExtractorConfig) -> Self {
        Self {
            backends,
            detector: RegionDetector::new(config.max_regions),
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn backend_ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    pub fn extract_from_bytes(&self, image_bytes: &[u8]) -> PlateResult {
        match ImageProcessor::load_from_bytes(image_bytes) {
            Ok(image) => self.extract(&image),
            Err(e) => {
                log::error!("{}", e);
                PlateResult::failure(DECODE_FAILED_MESSAGE, None)
            }
        }
    }

    pub fn extract_from_file<P: AsRef<Path>>(&self, path: P) -> PlateResult {
        match ImageProcessor::load_from_file(path) {
            Ok(image) => self.extract(&image),
            Err(e) => {
                log::error!("{}", e);
                PlateResult::failure(READ_FAILED_MESSAGE, None)
            }
        }
    }

    pub fn extract(&self, image: &DynamicImage) -> PlateResult {
        let active: Vec<&dyn OcrBackend> = self
            .backends
            .iter()
            .map(|b| b.as_ref())
            .filter(|b| b.is_available())
            .collect();
        if active.is_empty() {
            log::warn!("{}", NO_BACKEND_MESSAGE);
            return PlateResult::failure(NO_BACKEND_MESSAGE, None);
        }

        let regions = self.detector.detect(image);
        log::info!("Found {} potential plate region(s)", regions.len());

        let detections = Self::collect_detections(&regions, &active);
        self.select_best(&detections)
    }

    fn collect_detections(regions: &[RegionCandidate], backends: &[&dyn OcrBackend]) -> Vec<Detection> {
        let mut detections = Vec::new();

        for region in regions {
            for variant in ImageProcessor::preprocess_for_ocr(&region.image) {
                for backend in backends {
                    match backend.read(&variant) {
                        Ok(reads) => detections.extend(reads.into_iter().map(|read| Detection {
                            text: read.text,
                            confidence: read.confidence,
                            bbox: region.bbox,
                            backend: backend.id().to_string(),
                        })),
                        Err(e) => log::error!("{} error: {}", backend.id(), e),
                    }
                }
            }
        }

        detections
    }

    /// Validate every detection and return the most confident valid one.
    ///
    /// The configured multiplier is applied as is, so values below 1.0 demote
    /// a backend. Ties on confidence go to the larger multiplier, then to the
    /// earliest read.
    pub fn select_best(&self, detections: &[Detection]) -> PlateResult {
        let mut candidates: Vec<Candidate> = detections
            .iter()
            .filter_map(|detection| {
                let (formatted, format, is_valid) = PlateValidator::validate_and_format(&detection.text);
                if !is_valid {
                    return None;
                }
                let boost = self.config.boost_for(&detection.backend);
                Some(Candidate {
                    result: PlateResult {
                        plate_text: detection.text.clone(),
                        formatted_plate: formatted,
                        confidence: (detection.confidence * boost).min(1.0),
                        plate_format: format,
                        bounding_box: Some(detection.bbox),
                        raw_detections: Some(vec![detection.text.clone()]),
                        error: None,
                    },
                    boost,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.result
                .confidence
                .total_cmp(&a.result.confidence)
                .then(b.boost.total_cmp(&a.boost))
        });

        match candidates.into_iter().next() {
            Some(best) => {
                log::info!(
                    "Selected plate {} ({}) with confidence {:.2}",
                    best.result.formatted_plate,
                    best.result.plate_format,
                    best.result.confidence
                );
                best.result
            }
            None => {
                log::warn!("{} among {} raw detection(s)", NO_VALID_PLATE_MESSAGE, detections.len());
                PlateResult::failure(
                    NO_VALID_PLATE_MESSAGE,
                    Some(detections.iter().map(|d| d.text.clone()).collect()),
                )
            }
        }
    }
}

/// Process-wide extractor built on first use.
///
/// Concurrent first calls build one extractor; later calls share it.
pub struct SharedExtractor {
    config: ExtractorConfig,
    instance: Mutex<Option<Arc<PlateExtractor>>>,
}

impl SharedExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            instance: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Arc<PlateExtractor> {
        let mut slot = self.instance.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.get_or_insert_with(|| {
            log::debug!("Initializing plate extractor");
            Arc::new(PlateExtractor::new(self.config.clone()))
        })
        .clone()
    }
}
