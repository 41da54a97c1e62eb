use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtworkError {
    // ========================================================================
    // Request Errors
    // ========================================================================
    #[error("Invalid transform combination: {0}")]
    InvalidTransformCombination(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Category {0} has no canonical store")]
    NoCanonicalStore(String),

    // ========================================================================
    // Codec Errors
    // ========================================================================
    #[error("Failed to decode artwork for {name}: {message}")]
    DecodeFailure { name: String, message: String },

    #[error("Failed to encode artwork: {0}")]
    EncodeFailure(String),

    #[error("Transform failed: {0}")]
    TransformFailed(String),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl ArtworkError {
    /// The canonical bytes themselves are unusable.
    pub fn is_source_problem(&self) -> bool {
        matches!(self, ArtworkError::DecodeFailure { .. })
    }

    /// Writing to or reading from disk failed, not the request itself.
    pub fn is_persistence(&self) -> bool {
        match self {
            ArtworkError::EncodeFailure(_) => true,
            ArtworkError::Bridge(e) => {
                matches!(e, BridgeError::Io(_) | BridgeError::OperationFailed(_))
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArtworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let decode = ArtworkError::DecodeFailure {
            name: "Kind of Blue".to_string(),
            message: "bad header".to_string(),
        };
        assert!(decode.is_source_problem());
        assert!(!decode.is_persistence());

        let io = ArtworkError::from(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )));
        assert!(io.is_persistence());
        assert!(!ArtworkError::InvalidDimensions { width: 0, height: 1 }.is_persistence());
    }

    #[test]
    fn test_display() {
        let err = ArtworkError::InvalidDimensions { width: 0, height: 10 };
        assert_eq!(err.to_string(), "Invalid dimensions: 0x10");
    }
}
