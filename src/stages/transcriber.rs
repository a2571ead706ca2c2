use crate::defaults;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Recognized text plus the language the recognizer detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default = "unknown_language")]
    pub language: String,
}

impl Transcript {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

fn unknown_language() -> String {
    defaults::UNKNOWN_LANGUAGE.to_string()
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (external engine vs mock).
/// Calls are blocking; the relay runs them on the blocking thread pool.
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `audio_path`.
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;

    /// Short name used in status reports and logs
    fn name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> to allow sharing across requests.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        (**self).transcribe(audio_path)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock transcriber for testing
#[derive(Debug)]
pub struct MockTranscriber {
    name: String,
    response: Transcript,
    should_fail: bool,
    should_panic: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: Transcript::new("mock transcription", "en"),
            should_fail: false,
            should_panic: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the mock to return a specific transcript
    pub fn with_response(mut self, text: &str, language: &str) -> Self {
        self.response = Transcript::new(text, language);
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to panic on transcribe
    pub fn with_panic(mut self) -> Self {
        self.should_panic = true;
        self
    }

    /// Block for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of transcribe calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_panic {
            panic!("mock transcriber panicked on {}", audio_path.display());
        }
        if self.should_fail {
            Err(RelayError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
