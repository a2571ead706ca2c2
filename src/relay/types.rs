//! Request and response types of the translation relay.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One unit of work: raw audio and the language to translate into.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub audio: Vec<u8>,
    pub target_lang: String,
}

impl TranslationRequest {
    pub fn new(audio: impl Into<Vec<u8>>, target_lang: impl Into<String>) -> Self {
        Self {
            audio: audio.into(),
            target_lang: target_lang.into(),
        }
    }
}

/// Outcome category of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
    Busy,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResultStatus::Success => "success",
            ResultStatus::Error => "error",
            ResultStatus::Busy => "busy",
        };
        f.write_str(s)
    }
}

/// Failure taxonomy carried by `busy` and `error` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Admission refused
    Capacity,
    /// Malformed request
    Validation,
    Transcription,
    Translation,
    Unexpected,
}

impl ErrorKind {
    /// Equivalent HTTP status code, for callers that front the relay with HTTP.
    pub fn http_status(self, oversized: bool) -> u16 {
        match self {
            ErrorKind::Capacity => 429,
            ErrorKind::Validation if oversized => 413,
            ErrorKind::Validation => 400,
            ErrorKind::Transcription | ErrorKind::Translation | ErrorKind::Unexpected => 500,
        }
    }
}

/// Wall time spent in each stage, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub transcription: f64,
    pub translation: f64,
    pub tts: f64,
}

impl StageTimings {
    pub fn total(&self) -> f64 {
        self.transcription + self.translation + self.tts
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn unknown_language() -> String {
    defaults::UNKNOWN_LANGUAGE.to_string()
}

/// Response for one request. Serializes to the relay's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// HTTP-equivalent status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default)]
    pub original_text: String,
    #[serde(default = "unknown_language")]
    pub detected_language: String,
    #[serde(default)]
    pub translated_text: String,
    /// Absolute path of the synthesized audio, if any
    #[serde(default)]
    pub audio_output: Option<String>,
    /// Total wall time in seconds
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<StageTimings>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_translation_needed: bool,
}

impl TranslationResult {
    fn base(status: ResultStatus, elapsed: Duration) -> Self {
        Self {
            status,
            message: None,
            error_kind: None,
            code: None,
            original_text: String::new(),
            detected_language: unknown_language(),
            translated_text: String::new(),
            audio_output: None,
            processing_time: elapsed.as_secs_f64(),
            timing: None,
            skipped: false,
            no_translation_needed: false,
        }
    }

    /// Successful result with no text: silence or a too-short payload.
    pub fn empty(elapsed: Duration) -> Self {
        Self::base(ResultStatus::Success, elapsed)
    }

    /// Successful result carrying the recognized text.
    pub fn success(
        original_text: impl Into<String>,
        detected_language: impl Into<String>,
        translated_text: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            original_text: original_text.into(),
            detected_language: detected_language.into(),
            translated_text: translated_text.into(),
            ..Self::base(ResultStatus::Success, elapsed)
        }
    }

    pub fn busy(elapsed: Duration) -> Self {
        Self {
            message: Some("Server busy, please try again".to_string()),
            error_kind: Some(ErrorKind::Capacity),
            code: Some(ErrorKind::Capacity.http_status(false)),
            ..Self::base(ResultStatus::Busy, elapsed)
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: Some(message.into()),
            error_kind: Some(kind),
            code: Some(kind.http_status(false)),
            ..Self::base(ResultStatus::Error, elapsed)
        }
    }

    /// Validation error for a payload above the size limit.
    pub fn too_large(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            code: Some(ErrorKind::Validation.http_status(true)),
            ..Self::error(ErrorKind::Validation, message, elapsed)
        }
    }

    pub fn with_skipped(mut self) -> Self {
        self.skipped = true;
        self
    }

    pub fn with_no_translation_needed(mut self) -> Self {
        self.no_translation_needed = true;
        self
    }

    pub fn with_audio_output(mut self, audio_output: Option<String>) -> Self {
        self.audio_output = audio_output;
        self
    }

    pub fn with_timing(mut self, timing: StageTimings) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Availability of each configured stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStatus {
    pub transcriber: String,
    pub translator: String,
    /// `None` when synthesis is disabled
    pub synthesizer: Option<String>,
}

/// Snapshot of relay state for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatus {
    pub active_requests: usize,
    pub max_concurrent: usize,
    pub history_size: usize,
    pub artifact_count: usize,
    /// Memoized translations held by the translator
    #[serde(default)]
    pub translation_cache_size: usize,
    pub stages: StageStatus,
}

/// What `Relay::clear` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub history_cleared: usize,
    pub artifacts_removed: usize,
    #[serde(default)]
    pub translations_cleared: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_success_json_shape() {
        let result = TranslationResult::success(
            "Hello, how are you?",
            "en",
            "नमस्ते, आप कैसे हैं?",
            Duration::from_millis(1500),
        )
        .with_audio_output(Some("/cache/output_1a2b3c4d_1700000000.mp3".to_string()))
        .with_timing(StageTimings {
            transcription: 0.5,
            translation: 0.25,
            tts: 0.75,
        });

        let json: Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["original_text"], "Hello, how are you?");
        assert_eq!(json["detected_language"], "en");
        assert_eq!(json["translated_text"], "नमस्ते, आप कैसे हैं?");
        assert_eq!(json["audio_output"], "/cache/output_1a2b3c4d_1700000000.mp3");
        assert_eq!(json["processing_time"], 1.5);
        assert_eq!(json["timing"]["tts"], 0.75);
        assert!(json.get("message").is_none());
        assert!(json.get("skipped").is_none());
        assert!(json.get("no_translation_needed").is_none());
    }

    #[test]
    fn test_empty_result_has_null_audio_and_unknown_language() {
        let json: Value =
            serde_json::to_value(TranslationResult::empty(Duration::ZERO)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["detected_language"], "unknown");
        assert_eq!(json["original_text"], "");
        assert!(json["audio_output"].is_null());
        assert!(json.get("timing").is_none());
    }

    #[test]
    fn test_skipped_flag_serialized_only_when_set() {
        let json: Value = serde_json::to_value(
            TranslationResult::success("hi there", "en", "", Duration::ZERO).with_skipped(),
        )
        .unwrap();
        assert_eq!(json["skipped"], true);
        assert!(json.get("no_translation_needed").is_none());
    }

    #[test]
    fn test_busy_and_error_codes() {
        let busy = TranslationResult::busy(Duration::ZERO);
        assert_eq!(busy.status, ResultStatus::Busy);
        assert_eq!(busy.code, Some(429));
        assert_eq!(busy.error_kind, Some(ErrorKind::Capacity));

        let too_large = TranslationResult::too_large("Audio file too large", Duration::ZERO);
        assert_eq!(too_large.code, Some(413));

        let bad = TranslationResult::error(ErrorKind::Validation, "bad", Duration::ZERO);
        assert_eq!(bad.code, Some(400));

        let asr = TranslationResult::error(
            ErrorKind::Transcription,
            "Speech recognition failed: boom",
            Duration::ZERO,
        );
        assert_eq!(asr.code, Some(500));
        assert!(!asr.is_success());

        let json: Value = serde_json::to_value(&asr).unwrap();
        assert_eq!(json["error_kind"], "transcription");
        assert_eq!(json["message"], "Speech recognition failed: boom");
    }

    #[test]
    fn test_result_parses_back() {
        let original = TranslationResult::success("a b c", "en", "x y z", Duration::ZERO)
            .with_no_translation_needed();
        let parsed: TranslationResult =
            serde_json::from_str(&original.to_json().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_minimal_json_parses_with_defaults() {
        let parsed: TranslationResult =
            serde_json::from_str(r#"{"status":"busy","message":"Server busy, please try again"}"#)
                .unwrap();
        assert_eq!(parsed.status, ResultStatus::Busy);
        assert_eq!(parsed.detected_language, "unknown");
        assert!(parsed.audio_output.is_none());
    }

    #[test]
    fn test_stage_timings_total() {
        let timings = StageTimings {
            transcription: 1.0,
            translation: 0.5,
            tts: 0.25,
        };
        assert_eq!(timings.total(), 1.75);
    }
}
