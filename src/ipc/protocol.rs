//! JSON message protocol for IPC communication between CLI and daemon.

use crate::artifacts::SweepReport;
use crate::relay::{ClearReport, RelayStatus, TranslationResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Commands sent by CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Translate a recorded utterance
    Translate {
        /// Base64-encoded audio bytes
        audio: String,
        target_lang: String,
    },
    /// Get relay status
    Status,
    /// Clear dedup history and delete synthesized audio
    ClearCache,
    /// Reclaim expired artifacts now
    Sweep {
        /// Override the configured retention
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_age_secs: Option<u64>,
    },
    /// Shutdown the daemon
    Shutdown,
}

impl Command {
    /// Build a translate command from raw audio.
    pub fn translate(audio: &[u8], target_lang: &str) -> Self {
        Command::Translate {
            audio: STANDARD.encode(audio),
            target_lang: target_lang.to_string(),
        }
    }

    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Decode the base64 audio payload of a translate command.
pub fn decode_audio(audio: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(audio.trim())
}

/// Responses sent by daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command succeeded
    Ok,
    /// Outcome of a translate command, including busy and error outcomes
    Translation { result: TranslationResult },
    /// Current relay status
    Status {
        #[serde(flatten)]
        status: RelayStatus,
    },
    /// Cache cleared
    Cleared {
        #[serde(flatten)]
        report: ClearReport,
    },
    /// Sweep finished
    Swept {
        removed: usize,
        untracked_removed: usize,
    },
    /// Error occurred
    Error { message: String },
}

impl From<SweepReport> for Response {
    fn from(report: SweepReport) -> Self {
        Response::Swept {
            removed: report.removed,
            untracked_removed: report.untracked_removed,
        }
    }
}

impl Response {
    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
