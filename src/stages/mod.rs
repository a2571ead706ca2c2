//! External pipeline stages: speech recognition, translation, synthesis.

pub mod command;
pub mod language;
pub mod synthesizer;
pub mod transcriber;
pub mod translator;

pub use command::{
    CommandExecutor, CommandSynthesizer, CommandTranscriber, CommandTranslator,
    SystemCommandExecutor,
};
pub use synthesizer::{MockSynthesizer, Synthesizer};
pub use transcriber::{MockTranscriber, Transcriber, Transcript};
pub use translator::{
    CachingTranslator, MockTranslator, RetryPolicy, RetryingTranslator, Translator,
};
