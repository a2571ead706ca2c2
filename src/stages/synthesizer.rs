use crate::error::{RelayError, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for text-to-speech synthesis.
///
/// Implementations write the audio for `text` to `output`.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()>;

    fn name(&self) -> &str;
}

impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()> {
        (**self).synthesize(text, language, output)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing
#[derive(Debug)]
pub struct MockSynthesizer {
    name: String,
    audio: Vec<u8>,
    should_fail: bool,
    calls: AtomicUsize,
}

impl MockSynthesizer {
    /// Create a mock that writes a small fake MP3 file
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            audio: b"ID3\x04\x00mock-audio".to_vec(),
            should_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the mock to fail after writing a partial file
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of synthesize calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, _text: &str, _language: &str, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            fs::write(output, b"ID3")?;
            return Err(RelayError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }
        fs::write(output, &self.audio)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mock_synthesizer_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.mp3");
        let synth = MockSynthesizer::new("mock");

        synth.synthesize("नमस्ते", "hi", &output).unwrap();

        assert!(fs::metadata(&output).unwrap().len() > 0);
        assert_eq!(synth.calls(), 1);
    }

    #[test]
    fn test_mock_synthesizer_failure() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.mp3");
        let synth: Arc<dyn Synthesizer> = Arc::new(MockSynthesizer::new("mock").with_failure());

        let result = synth.synthesize("hello", "en", &output);
        assert!(matches!(result, Err(RelayError::Synthesis { .. })));
    }
}
