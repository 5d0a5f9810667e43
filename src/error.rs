//! Error handling for rvc-convert
//!
//! Every error carries a stable code and, where it helps, recovery
//! suggestions that the CLI prints next to the message.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for rvc-convert operations
pub type Result<T> = std::result::Result<T, RvcError>;

/// Main error type for rvc-convert operations
#[derive(Error, Debug)]
pub enum RvcError {
    // Model directory errors
    #[error("No .pth weights file found in model directory {}", dir.display())]
    ModelWeightsNotFound { dir: PathBuf },

    // File errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Parameter errors
    #[error("Invalid parameter '{param}': got {value}, expected {expected}")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    // Backend errors
    #[error("RVC bridge unavailable: {reason}")]
    BridgeUnavailable { reason: String },

    #[error("RVC bridge timed out after {timeout_ms}ms")]
    BridgeTimeout { timeout_ms: u64 },

    #[error("RVC bridge connection error: {message}")]
    BridgeConnectionError { message: String },

    #[error("Voice conversion failed: {reason}")]
    InferenceFailed { reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RvcError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RvcError::ModelWeightsNotFound { .. } => "MODEL_WEIGHTS_NOT_FOUND",
            RvcError::FileNotFound { .. } => "FILE_NOT_FOUND",
            RvcError::InvalidAudio { .. } => "INVALID_AUDIO",
            RvcError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            RvcError::EmptyAudio => "EMPTY_AUDIO",
            RvcError::InvalidParameter { .. } => "INVALID_PARAMETER",
            RvcError::BridgeUnavailable { .. } => "BRIDGE_UNAVAILABLE",
            RvcError::BridgeTimeout { .. } => "BRIDGE_TIMEOUT",
            RvcError::BridgeConnectionError { .. } => "BRIDGE_CONNECTION_ERROR",
            RvcError::InferenceFailed { .. } => "INFERENCE_FAILED",
            RvcError::Io(_) => "IO_ERROR",
            RvcError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the user can fix this error and retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RvcError::ModelWeightsNotFound { .. }
                | RvcError::FileNotFound { .. }
                | RvcError::InvalidAudio { .. }
                | RvcError::UnsupportedFormat { .. }
                | RvcError::InvalidParameter { .. }
                | RvcError::BridgeUnavailable { .. }
                | RvcError::BridgeTimeout { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RvcError::ModelWeightsNotFound { .. } => vec![
                "Put the trained model's .pth file inside the model directory",
                "Check that --model-dir points at the folder, not at the file",
            ],
            RvcError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            RvcError::InvalidAudio { .. } => vec![
                "Convert the input to WAV format first",
                "The file may be corrupted - try re-exporting from source",
            ],
            RvcError::UnsupportedFormat { .. } => vec![
                "Convert to 16-bit or 24-bit PCM WAV",
                "Check the WAV header declares at least one channel",
            ],
            RvcError::InvalidParameter { .. } => {
                vec!["Run 'rvc-convert --help' to see accepted values"]
            }
            RvcError::BridgeUnavailable { .. } => vec![
                "Start the RVC bridge service and check RVC_BRIDGE_URL",
                "Use '--backend mock' to test the pipeline without a model runtime",
            ],
            RvcError::BridgeTimeout { .. } => vec![
                "Raise RVC_BRIDGE_TIMEOUT_MS for long inputs",
                "Try a faster f0 method such as rmvpe",
            ],
            RvcError::InferenceFailed { .. } => vec![
                "Check the bridge logs for the underlying error",
                "Try a different f0 method",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = RvcError::ModelWeightsNotFound {
            dir: PathBuf::from("models/alice"),
        };
        assert_eq!(err.error_code(), "MODEL_WEIGHTS_NOT_FOUND");
        assert!(err.to_string().contains("models/alice"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = RvcError::BridgeUnavailable {
            reason: "connection refused".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());

        let err = RvcError::EmptyAudio;
        assert!(!err.is_recoverable());
        assert!(err.recovery_suggestions().is_empty());
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = RvcError::InvalidParameter {
            param: "protect".to_string(),
            value: "0.9".to_string(),
            expected: "value between 0.0 and 0.5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'protect': got 0.9, expected value between 0.0 and 0.5"
        );
    }
}
