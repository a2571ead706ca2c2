//! Pipeline orchestration for speech-to-speech translation.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{Relay, RelaySettings, Stage, Stages};
pub use types::{
    ClearReport, ErrorKind, RelayStatus, ResultStatus, StageStatus, StageTimings,
    TranslationRequest, TranslationResult,
};
