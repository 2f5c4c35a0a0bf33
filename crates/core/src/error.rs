//! Error types for the plate-vision-core library.
//!
//! Failures on the request path (acquiring an image, talking to the detection
//! service) are modelled separately from library-level failures so they can be
//! stored in the request lifecycle and shown to the user. Every request-path
//! error is recoverable: the user retries by starting a new capture or upload.

use thiserror::Error;

/// Failures while acquiring an image from a live feed or a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageSourceError {
    /// Capture was requested before the feed produced a frame.
    #[error("No frame available from the live feed")]
    NoFrameAvailable,

    /// The selected file could not be read or decoded as an image.
    #[error("Unreadable image file: {0}")]
    UnreadableFile(String),
}

/// Failures of a single exchange with the detection service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// Connection refused, timeout, or a non-2xx status.
    #[error("Detection failed: {0}")]
    NetworkFailure(String),

    /// The service answered but reported an application-level error.
    #[error("Detection service error: {0}")]
    ServiceError(String),

    /// The response body does not follow the service contract.
    #[error("Malformed response from detection service: {0}")]
    MalformedResponse(String),
}

/// Any failure that can end a request generation.
///
/// This is what a `Failed` lifecycle state carries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Source(#[from] ImageSourceError),

    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Errors that can occur within the plate-vision-core library outside of the
/// request path.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid endpoint, thresholds, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Screen enumeration or capture setup failed.
    #[error("Screen capture failed: {0}")]
    ScreenCapture(String),

    /// Requested screen/monitor index was not found.
    #[error("Screen not found: index {0}")]
    ScreenNotFound(usize),

    /// Image processing or encoding failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// A request-path failure surfaced outside the lifecycle (e.g. the CLI).
    #[error(transparent)]
    Request(#[from] RequestError),

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a screen capture error with the given message.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::ScreenCapture(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_wraps_both_taxonomies() {
        let from_source: RequestError = ImageSourceError::NoFrameAvailable.into();
        let from_service: RequestError = DetectionError::ServiceError("model offline".into()).into();

        assert_eq!(from_source.to_string(), "No frame available from the live feed");
        assert_eq!(
            from_service.to_string(),
            "Detection service error: model offline"
        );
    }

    #[test]
    fn failed_request_surfaces_as_app_error() {
        let failed = RequestError::Detection(DetectionError::NetworkFailure("HTTP 502".into()));
        let err = AppError::from(failed.clone());

        assert!(matches!(&err, AppError::Request(inner) if *inner == failed));
        assert_eq!(err.to_string(), "Detection failed: HTTP 502");
    }

    #[test]
    fn app_error_helpers() {
        assert!(matches!(AppError::config("bad"), AppError::Config(m) if m == "bad"));
        assert!(matches!(AppError::ui("x"), AppError::Ui(_)));
    }
}
