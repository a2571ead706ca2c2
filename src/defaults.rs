//! Default configuration constants for lingorelay.
//!
//! Shared by the config types, the relay and the CLI so the same limits
//! apply everywhere.

/// Payloads smaller than this many bytes are treated as silence.
///
/// A few hundred bytes of compressed audio is container overhead with no
/// speech in it; no stage is invoked for such payloads.
pub const MIN_AUDIO_BYTES: usize = 500;

/// Payloads larger than this many bytes are rejected before any stage runs.
pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of requests allowed in flight at once.
pub const MAX_CONCURRENT_REQUESTS: usize = 3;

/// Number of accepted transcripts remembered for duplicate suppression.
pub const HISTORY_CAPACITY: usize = 10;

/// Jaccard similarity above which a transcript counts as a repeat.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Trimmed transcripts shorter than this (in characters) are always
/// treated as repeats: they are noise, not content.
pub const MIN_DEDUP_CHARS: usize = 3;

/// Trimmed transcripts shorter than this (in characters) are not
/// translated at all.
pub const MIN_TEXT_CHARS: usize = 2;

/// Age in seconds after which a synthesized artifact is reclaimed.
pub const ARTIFACT_RETENTION_SECS: u64 = 300;

/// Interval in seconds between periodic artifact sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Registry size above which a request triggers a background sweep.
pub const OPPORTUNISTIC_SWEEP_THRESHOLD: usize = 20;

/// Upper bound on a single external stage call, in milliseconds.
pub const STAGE_TIMEOUT_MS: u64 = 30_000;

/// Translation attempts before giving up.
pub const TRANSLATE_ATTEMPTS: u32 = 3;

/// Delay between translation attempts, in milliseconds.
pub const TRANSLATE_RETRY_DELAY_MS: u64 = 1000;

/// Memoized translations kept per process. Zero disables the memo.
pub const TRANSLATION_CACHE_SIZE: usize = 100;

/// Oldest memo entries dropped at once when the memo is full.
pub const TRANSLATION_CACHE_EVICT_BATCH: usize = 20;

/// Time spent discarding the rest of an oversized IPC request before
/// answering it, in milliseconds.
pub const IPC_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Target language used when a request does not name one.
pub const DEFAULT_TARGET_LANGUAGE: &str = "hi";

/// Language reported when the transcriber could not tell.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Suffix for transient request audio files.
pub const TRANSIENT_AUDIO_SUFFIX: &str = ".webm";

/// Extension of synthesized artifacts.
pub const ARTIFACT_EXTENSION: &str = "mp3";

/// Name of the application directory under XDG config/cache/runtime dirs.
pub const APP_NAME: &str = "lingorelay";
