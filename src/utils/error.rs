use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlateError {
    #[error("Could not decode image: {0}")]
    ImageDecodeError(String),
    #[error("Could not read image file: {0}")]
    ImageReadError(String),
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("OCR backend not available: {0}")]
    BackendUnavailable(String),
    #[error("OCR backend {backend} failed: {message}")]
    BackendError { backend: String, message: String },
    #[error("{0}")]
    InvalidPlate(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl PlateError {
    pub fn backend(backend: &str, message: impl Into<String>) -> Self {
        PlateError::BackendError {
            backend: backend.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PlateError {
    fn from(err: std::io::Error) -> Self {
        PlateError::IoError(err.to_string())
    }
}
