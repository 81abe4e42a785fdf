use std::fmt;

use serde::{Deserialize, Serialize};

/// Known plate layouts. `Unknown` marks text that parses no grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlateFormat {
    #[serde(rename = "legacy")]
    Legacy, // UAX 123Y - 3 letters, 3-4 digits, 1 letter
    #[serde(rename = "new")]
    NewStandard, // UA 077AK - 2 letters, 3 digits, 2 letters
    #[serde(rename = "motorcycle")]
    Motorcycle, // UMA 055AF - 3 letters, 3 digits, 2 letters
    #[serde(rename = "government")]
    Government, // UP 6633 - 2 letters, 4 digits
    #[serde(rename = "unknown")]
    Unknown,
}

impl PlateFormat {
    /// Every real format, in the order hypotheses are tried and grammars matched.
    pub const KNOWN: [PlateFormat; 4] = [
        PlateFormat::Legacy,
        PlateFormat::NewStandard,
        PlateFormat::Motorcycle,
        PlateFormat::Government,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlateFormat::Legacy => "legacy",
            PlateFormat::NewStandard => "new",
            PlateFormat::Motorcycle => "motorcycle",
            PlateFormat::Government => "government",
            PlateFormat::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != PlateFormat::Unknown
    }
}

impl fmt::Display for PlateFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Axis-aligned box in source-image pixels, `x2`/`y2` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let overlap_x = self.x2.min(other.x2).saturating_sub(self.x1.max(other.x1));
        let overlap_y = self.y2.min(other.y2).saturating_sub(self.y1.max(other.y1));
        overlap_x as u64 * overlap_y as u64
    }

    /// Share of this box's own area covered by `other`.
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / area as f64
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

/// One raw OCR read of one processed variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub text: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub backend: String,
}

/// Outcome of one extraction call. Always produced, valid or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateResult {
    pub plate_text: String,
    pub formatted_plate: String,
    pub confidence: f64,
    pub plate_format: PlateFormat,
    pub bounding_box: Option<BoundingBox>,
    pub raw_detections: Option<Vec<String>>,
    pub error: Option<String>,
}

impl PlateResult {
    pub fn failure(error: impl Into<String>, raw_detections: Option<Vec<String>>) -> Self {
        Self {
            plate_text: String::new(),
            formatted_plate: String::new(),
            confidence: 0.0,
            plate_format: PlateFormat::Unknown,
            bounding_box: None,
            raw_detections,
            error: Some(error.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.confidence > 0.5
    }

    /// Flattened view for JSON callers; plate and format are blanked unless valid.
    pub fn to_api_response(&self) -> ApiResponse {
        let success = self.is_valid();
        ApiResponse {
            success,
            plate: if success {
                self.formatted_plate.clone()
            } else {
                String::new()
            },
            confidence: self.confidence,
            format: if success {
                self.plate_format.as_str().to_string()
            } else {
                PlateFormat::Unknown.as_str().to_string()
            },
            raw_detections: self.raw_detections.clone().unwrap_or_default(),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub plate: String,
    pub confidence: f64,
    pub format: String,
    pub raw_detections: Vec<String>,
    pub error: Option<String>,
}
