use crate::defaults;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub limits: LimitsConfig,
    pub dedup: DedupConfig,
    pub cache: CacheConfig,
    pub stages: StagesConfig,
    pub daemon: DaemonConfig,
}

/// Request admission and payload limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub min_audio_bytes: usize,
    pub max_audio_bytes: usize,
    pub max_concurrent: usize,
    pub default_target_lang: String,
}

/// Duplicate suppression
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
    pub capacity: usize,
    pub threshold: f64,
}

/// Synthesized artifact storage and reclamation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for synthesized audio (default: XDG cache dir)
    pub dir: Option<PathBuf>,
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_threshold: usize,
}

/// External stage bindings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StagesConfig {
    pub timeout_ms: u64,
    /// Memoized translations kept in memory (0 disables)
    pub translation_cache_size: usize,
    pub transcriber: Option<StageCommand>,
    pub translator: Option<StageCommand>,
    pub synthesizer: Option<StageCommand>,
    pub retry: RetryConfig,
}

/// External program invoked for a stage.
///
/// Arguments may contain placeholders (`{input}`, `{text}`, `{source}`,
/// `{target}`, `{lang}`, `{output}`) that are substituted per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Translation retry policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub delay_ms: u64,
    pub backoff: f64,
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket: Option<PathBuf>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_audio_bytes: defaults::MIN_AUDIO_BYTES,
            max_audio_bytes: defaults::MAX_AUDIO_BYTES,
            max_concurrent: defaults::MAX_CONCURRENT_REQUESTS,
            default_target_lang: defaults::DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::HISTORY_CAPACITY,
            threshold: defaults::SIMILARITY_THRESHOLD,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            retention_secs: defaults::ARTIFACT_RETENTION_SECS,
            sweep_interval_secs: defaults::SWEEP_INTERVAL_SECS,
            sweep_threshold: defaults::OPPORTUNISTIC_SWEEP_THRESHOLD,
        }
    }
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::STAGE_TIMEOUT_MS,
            translation_cache_size: defaults::TRANSLATION_CACHE_SIZE,
            transcriber: None,
            translator: None,
            synthesizer: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: defaults::TRANSLATE_ATTEMPTS,
            delay_ms: defaults::TRANSLATE_RETRY_DELAY_MS,
            backoff: 1.0,
        }
    }
}

impl CacheConfig {
    /// Directory where synthesized artifacts are written.
    ///
    /// Falls back to `$XDG_CACHE_HOME/lingorelay/audio`, then the system
    /// temp dir when no cache dir is known.
    pub fn artifact_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(defaults::APP_NAME)
            .join("audio")
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl StagesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LINGORELAY_MAX_CONCURRENT → limits.max_concurrent
    /// - LINGORELAY_TARGET_LANG → limits.default_target_lang
    /// - LINGORELAY_ARTIFACT_DIR → cache.dir
    /// - LINGORELAY_SOCKET → daemon.socket
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("LINGORELAY_MAX_CONCURRENT")
            && let Ok(max) = value.trim().parse::<usize>()
        {
            self.limits.max_concurrent = max;
        }

        if let Ok(lang) = std::env::var("LINGORELAY_TARGET_LANG")
            && !lang.is_empty()
        {
            self.limits.default_target_lang = lang;
        }

        if let Ok(dir) = std::env::var("LINGORELAY_ARTIFACT_DIR")
            && !dir.is_empty()
        {
            self.cache.dir = Some(PathBuf::from(dir));
        }

        if let Ok(socket) = std::env::var("LINGORELAY_SOCKET")
            && !socket.is_empty()
        {
            self.daemon.socket = Some(PathBuf::from(socket));
        }

        self
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_concurrent == 0 {
            return Err(invalid("limits.max_concurrent", "must be at least 1"));
        }
        if self.limits.min_audio_bytes > self.limits.max_audio_bytes {
            return Err(invalid(
                "limits.min_audio_bytes",
                "must not exceed limits.max_audio_bytes",
            ));
        }
        if self.dedup.capacity == 0 {
            return Err(invalid("dedup.capacity", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.dedup.threshold) {
            return Err(invalid("dedup.threshold", "must be between 0.0 and 1.0"));
        }
        if self.stages.timeout_ms == 0 {
            return Err(invalid("stages.timeout_ms", "must be positive"));
        }
        if self.stages.retry.attempts == 0 {
            return Err(invalid("stages.retry.attempts", "must be at least 1"));
        }
        let backoff = self.stages.retry.backoff;
        if !backoff.is_finite() || backoff < 1.0 {
            return Err(invalid("stages.retry.backoff", "must be a finite number >= 1.0"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(invalid("cache.sweep_interval_secs", "must be at least 1"));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RelayError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/lingorelay/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(defaults::APP_NAME)
            .join("config.toml")
    }
}

fn invalid(key: &str, message: &str) -> RelayError {
    RelayError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
