//! Error types for lingorelay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Request validation errors
    #[error("Audio file too large: {size} bytes (maximum {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Stage errors
    #[error("Speech recognition failed: {message}")]
    Transcription { message: String },

    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("{stage} stage timed out after {timeout_ms}ms")]
    StageTimeout { stage: String, timeout_ms: u64 },

    #[error("Stage tool not found: {tool}")]
    StageToolNotFound { tool: String },

    #[error("Stage tool failed: {message}")]
    StageToolFailed { message: String },

    // Artifact cache errors
    #[error("Artifact storage error: {message}")]
    ArtifactStorage { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = RelayError::ConfigInvalidValue {
            key: "limits.max_concurrent".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for limits.max_concurrent: must be positive"
        );
    }

    #[test]
    fn test_payload_too_large_display() {
        let error = RelayError::PayloadTooLarge {
            size: 20_000_000,
            max: 10_485_760,
        };
        assert_eq!(
            error.to_string(),
            "Audio file too large: 20000000 bytes (maximum 10485760)"
        );
    }

    #[test]
    fn test_stage_errors_carry_stage_prefix() {
        let asr = RelayError::Transcription {
            message: "model crashed".to_string(),
        };
        assert_eq!(asr.to_string(), "Speech recognition failed: model crashed");

        let mt = RelayError::Translation {
            message: "quota exceeded".to_string(),
        };
        assert_eq!(mt.to_string(), "Translation failed: quota exceeded");

        let tts = RelayError::Synthesis {
            message: "voice missing".to_string(),
        };
        assert_eq!(tts.to_string(), "Speech synthesis failed: voice missing");
    }

    #[test]
    fn test_stage_timeout_display() {
        let error = RelayError::StageTimeout {
            stage: "translation".to_string(),
            timeout_ms: 30000,
        };
        assert_eq!(
            error.to_string(),
            "translation stage timed out after 30000ms"
        );
    }

    #[test]
    fn test_stage_tool_not_found_display() {
        let error = RelayError::StageToolNotFound {
            tool: "whisper-cli".to_string(),
        };
        assert_eq!(error.to_string(), "Stage tool not found: whisper-cli");
    }

    #[test]
    fn test_ipc_errors_display() {
        let socket = RelayError::IpcSocket {
            message: "bind failed".to_string(),
        };
        assert_eq!(socket.to_string(), "IPC socket error: bind failed");

        let protocol = RelayError::IpcProtocol {
            message: "invalid message format".to_string(),
        };
        assert_eq!(
            protocol.to_string(),
            "IPC protocol error: invalid message format"
        );

        let connection = RelayError::IpcConnection {
            message: "timeout".to_string(),
        };
        assert_eq!(connection.to_string(), "IPC connection failed: timeout");
    }

    #[test]
    fn test_other_display() {
        let error = RelayError::Other("unexpected error".to_string());
        assert_eq!(error.to_string(), "unexpected error");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: RelayError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: RelayError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RelayError>();
        assert_sync::<RelayError>();
    }
}
