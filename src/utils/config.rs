use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::PlateError;

/// Backend id of the single-line Tesseract adapter.
pub const TESSERACT_LINE: &str = "tesseract-line";
/// Backend id of the block-mode Tesseract adapter.
pub const TESSERACT_BLOCK: &str = "tesseract-block";

/// Runtime settings for the extraction pipeline.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Directory holding `*.traineddata`. Falls back to `TESSDATA_PREFIX`.
    pub tessdata_path: Option<PathBuf>,
    pub language: String,
    pub backends: BackendToggles,
    /// Confidence given to reads from engines that report none.
    pub fixed_confidence: f64,
    pub confidence_boost: Option<ConfidenceBoost>,
    pub max_regions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToggles {
    pub tesseract_line: bool,
    pub tesseract_block: bool,
}

/// Multiplier applied to validated reads of one backend before ranking.
///
/// Values above 1.0 promote the backend, values below 1.0 demote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBoost {
    pub backend: String,
    pub multiplier: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tessdata_path: None,
            language: "eng".to_string(),
            backends: BackendToggles::default(),
            fixed_confidence: 0.7,
            confidence_boost: Some(ConfidenceBoost::default()),
            max_regions: 5,
        }
    }
}

impl Default for BackendToggles {
    fn default() -> Self {
        Self {
            tesseract_line: true,
            tesseract_block: true,
        }
    }
}

impl Default for ConfidenceBoost {
    fn default() -> Self {
        Self {
            backend: TESSERACT_BLOCK.to_string(),
            multiplier: 1.1,
        }
    }
}

impl ExtractorConfig {
    /// Load a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PlateError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PlateError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, PlateError> {
        let config: ExtractorConfig = serde_json::from_str(raw)
            .map_err(|e| PlateError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PlateError> {
        if !(0.0..=1.0).contains(&self.fixed_confidence) {
            return Err(PlateError::ConfigError(format!(
                "fixed_confidence must be within [0, 1], got {}",
                self.fixed_confidence
            )));
        }
        if let Some(boost) = &self.confidence_boost {
            if boost.multiplier <= 0.0 {
                return Err(PlateError::ConfigError(format!(
                    "confidence_boost.multiplier must be positive, got {}",
                    boost.multiplier
                )));
            }
        }
        if self.max_regions == 0 {
            return Err(PlateError::ConfigError(
                "max_regions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Data path handed to the OCR engine: config value first, then `TESSDATA_PREFIX`.
    pub fn resolved_tessdata(&self) -> Option<String> {
        self.tessdata_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| std::env::var("TESSDATA_PREFIX").ok())
    }

    /// Multiplier for reads produced by `backend` (1.0 when not boosted).
    pub fn boost_for(&self, backend: &str) -> f64 {
        match &self.confidence_boost {
            Some(boost) if boost.backend == backend => boost.multiplier,
            _ => 1.0,
        }
    }
}
