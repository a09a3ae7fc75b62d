// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the pose tracking pipeline.

use std::fmt;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pose tracking pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The input video (or another input file) could not be opened or read.
    ReadError(String),
    /// An output artifact or directory could not be written.
    WriteError(String),
    /// Error loading the model weights.
    ModelLoadError(String),
    /// Error while running the pose model on a frame.
    InferenceError(String),
    /// Error inside the tracker while associating detections.
    TrackingError(String),
    /// Error processing images.
    ImageError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// Video decoding or encoding error.
    VideoError(String),
    /// Track log (de)serialization error.
    SerializationError(String),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadError(msg) => write!(f, "Read error: {msg}"),
            Self::WriteError(msg) => write!(f, "Write error: {msg}"),
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::TrackingError(msg) => write!(f, "Tracking error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::VideoError(msg) => write!(f, "Video error: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::ReadError("test.mp4".to_string());
        assert_eq!(err.to_string(), "Read error: test.mp4");

        let err = PipelineError::WriteError("out".to_string());
        assert_eq!(err.to_string(), "Write error: out");

        let err = PipelineError::TrackingError("test".to_string());
        assert_eq!(err.to_string(), "Tracking error: test");
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let err = PipelineError::from(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("disk full"));

        let err = PipelineError::ConfigError("bad".to_string());
        assert!(err.source().is_none());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<Vec<u32>, _> = serde_json::from_str("[1, 2");
        let err = PipelineError::from(parse.unwrap_err());
        assert!(matches!(err, PipelineError::SerializationError(_)));
    }
}
