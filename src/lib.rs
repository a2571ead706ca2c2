//! lingorelay - speech-to-speech translation relay
//!
//! Admits recorded utterances, transcribes them, drops near-repeats,
//! translates the text and optionally synthesizes it as speech.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod admission;
pub mod artifacts;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod dedup;
pub mod defaults;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod relay;
pub mod stages;

// Core state
pub use admission::{AdmissionController, AdmissionPermit};
pub use artifacts::{ArtifactCache, SweepReport};
pub use dedup::RecencyDeduplicator;

// Pipeline
pub use relay::{Relay, RelaySettings, Stages, TranslationRequest, TranslationResult};

// Stage traits (transcribe → translate → synthesize)
pub use stages::{Synthesizer, Transcriber, Translator};

// Error handling
pub use error::{RelayError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
