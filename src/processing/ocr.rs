use image::GrayImage;

use crate::utils::{ExtractorConfig, PlateError};

/// One line of text read by a backend, confidence already in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct RawRead {
    pub text: String,
    pub confidence: f64,
}

impl RawRead {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence: normalize_confidence(confidence),
        }
    }
}

/// Uniform face of an OCR engine.
///
/// `is_available` is cheap after the first call; an unavailable backend is
/// skipped by the extractor instead of failing the extraction.
pub trait OcrBackend: Send + Sync {
    fn id(&self) -> &str;

    fn is_available(&self) -> bool;

    fn read(&self, image: &GrayImage) -> Result<Vec<RawRead>, PlateError>;
}

/// Clamp to [0, 1]; NaN counts as no confidence.
pub fn normalize_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Instantiate the backends enabled in `config`, line reader first.
#[cfg(feature = "tesseract")]
pub fn build_backends(config: &ExtractorConfig) -> Vec<Box<dyn OcrBackend>> {
    let mut backends: Vec<Box<dyn OcrBackend>> = Vec::new();
    if config.backends.tesseract_line {
        backends.push(Box::new(TesseractBackend::new(TesseractMode::SingleLine, config)));
    }
    if config.backends.tesseract_block {
        backends.push(Box::new(TesseractBackend::new(TesseractMode::Block, config)));
    }
    backends
}

#[cfg(not(feature = "tesseract"))]
pub fn build_backends(_config: &ExtractorConfig) -> Vec<Box<dyn OcrBackend>> {
    log::warn!("Built without the `tesseract` feature, no OCR backends compiled in");
    Vec::new()
}

#[cfg(feature = "tesseract")]
pub use self::tess::{TesseractBackend, TesseractMode};

#[cfg(feature = "tesseract")]
mod tess {
    use std::sync::OnceLock;

    use image::GrayImage;
    use tesseract::{PageSegMode, Tesseract};

    use super::{OcrBackend, RawRead};
    use crate::processing::ImageProcessor;
    use crate::utils::config::{TESSERACT_BLOCK, TESSERACT_LINE};
    use crate::utils::{ExtractorConfig, PlateError};

    const PLATE_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TesseractMode {
        /// PSM 7, whole image read as one line. No per-read confidence.
        SingleLine,
        /// PSM 6, one read per output line with the engine's mean confidence.
        Block,
    }

    impl TesseractMode {
        fn id(&self) -> &'static str {
            match self {
                TesseractMode::SingleLine => TESSERACT_LINE,
                TesseractMode::Block => TESSERACT_BLOCK,
            }
        }

        fn page_seg_mode(&self) -> PageSegMode {
            match self {
                TesseractMode::SingleLine => PageSegMode::PsmSingleLine,
                TesseractMode::Block => PageSegMode::PsmSingleBlock,
            }
        }
    }

    pub struct TesseractBackend {
        mode: TesseractMode,
        datapath: Option<String>,
        language: String,
        fixed_confidence: f64,
        available: OnceLock<bool>,
    }

    impl TesseractBackend {
        pub fn new(mode: TesseractMode, config: &ExtractorConfig) -> Self {
            Self {
                mode,
                datapath: config.resolved_tessdata(),
                language: config.language.clone(),
                fixed_confidence: config.fixed_confidence,
                available: OnceLock::new(),
            }
        }

        fn engine(&self) -> Result<Tesseract, PlateError> {
            Tesseract::new(self.datapath.as_deref(), Some(&self.language))
                .map_err(|e| PlateError::backend(self.id(), format!("Tesseract init error: {}", e)))
        }

        fn probe(&self) -> bool {
            match self.engine() {
                Ok(_) => {
                    log::info!("OCR backend {} available (lang {})", self.id(), self.language);
                    true
                }
                Err(e) => {
                    log::warn!("OCR backend {} not available: {}", self.id(), e);
                    false
                }
            }
        }
    }

    impl OcrBackend for TesseractBackend {
        fn id(&self) -> &str {
            self.mode.id()
        }

        fn is_available(&self) -> bool {
            *self.available.get_or_init(|| self.probe())
        }

        fn read(&self, image: &GrayImage) -> Result<Vec<RawRead>, PlateError> {
            if !self.is_available() {
                return Err(PlateError::BackendUnavailable(self.id().to_string()));
            }

            let temp_file = ImageProcessor::save_to_temp_file(image)?;
            let path = temp_file
                .path()
                .to_str()
                .ok_or_else(|| PlateError::backend(self.id(), "Temp file path is not valid UTF-8"))?;

            let mut tess = self
                .engine()?
                .set_variable("tessedit_char_whitelist", PLATE_WHITELIST)
                .map_err(|e| PlateError::backend(self.id(), format!("Tesseract set variable error: {}", e)))?;
            tess.set_page_seg_mode(self.mode.page_seg_mode());

            let mut tess = tess
                .set_image(path)
                .map_err(|e| PlateError::backend(self.id(), format!("Tesseract set image error: {}", e)))?;
            let text = tess
                .get_text()
                .map_err(|e| PlateError::backend(self.id(), format!("Tesseract error: {}", e)))?;

            let reads = match self.mode {
                TesseractMode::SingleLine => {
                    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    if line.is_empty() {
                        Vec::new()
                    } else {
                        vec![RawRead::new(line, self.fixed_confidence)]
                    }
                }
                TesseractMode::Block => {
                    let confidence = tess.mean_text_conf() as f64 / 100.0;
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(|line| RawRead::new(line, confidence))
                        .collect()
                }
            };

            log::debug!("{} read {} line(s)", self.id(), reads.len());
            Ok(reads)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(normalize_confidence(1.4), 1.0);
        assert_eq!(normalize_confidence(-0.2), 0.0);
        assert_eq!(normalize_confidence(f64::NAN), 0.0);
        assert_eq!(RawRead::new("UAX123Y", 0.93).confidence, 0.93);
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn test_no_backends_without_engine_feature() {
        assert!(build_backends(&ExtractorConfig::default()).is_empty());
    }

    #[cfg(feature = "tesseract")]
    #[test]
    fn test_backend_toggles() {
        use crate::utils::config::{TESSERACT_BLOCK, TESSERACT_LINE};

        let ids = |config: &ExtractorConfig| -> Vec<String> {
            build_backends(config).iter().map(|b| b.id().to_string()).collect()
        };

        let mut config = ExtractorConfig::default();
        assert_eq!(ids(&config), vec![TESSERACT_LINE, TESSERACT_BLOCK]);

        config.backends.tesseract_line = false;
        assert_eq!(ids(&config), vec![TESSERACT_BLOCK]);

        config.backends.tesseract_block = false;
        assert!(ids(&config).is_empty());
    }

    #[cfg(feature = "tesseract")]
    #[test]
    #[ignore] // needs tesseract and eng.traineddata installed
    fn test_tesseract_reads_rendered_text() {
        use image::Luma;

        let blank = GrayImage::from_pixel(200, 60, Luma([255]));
        for backend in build_backends(&ExtractorConfig::default()) {
            assert!(backend.is_available(), "{} should be available", backend.id());
            let reads = backend.read(&blank).unwrap();
            assert!(reads.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
        }
    }
}
