//! The translation relay: admission, transcription, dedup, translation,
//! synthesis and artifact bookkeeping for one request at a time.

use crate::admission::AdmissionController;
use crate::artifacts::{ArtifactCache, SweepReport, spawn_background_sweep};
use crate::config::Config;
use crate::dedup::RecencyDeduplicator;
use crate::defaults;
use crate::error::{RelayError, Result};
use crate::relay::types::{
    ClearReport, ErrorKind, RelayStatus, StageStatus, StageTimings, TranslationRequest,
    TranslationResult,
};
use crate::stages::{Synthesizer, Transcriber, Translator, language};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Pipeline stage, used for timeouts and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Translation,
    Synthesis,
}

impl Stage {
    /// Fold any error raised while running this stage into the stage's
    /// own error variant.
    fn fault(self, error: RelayError) -> RelayError {
        match (self, error) {
            (Stage::Transcription, e @ RelayError::Transcription { .. }) => e,
            (Stage::Translation, e @ RelayError::Translation { .. }) => e,
            (Stage::Synthesis, e @ RelayError::Synthesis { .. }) => e,
            (Stage::Transcription, e) => RelayError::Transcription {
                message: e.to_string(),
            },
            (Stage::Translation, e) => RelayError::Translation {
                message: e.to_string(),
            },
            (Stage::Synthesis, e) => RelayError::Synthesis {
                message: e.to_string(),
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Transcription => "transcription",
            Stage::Translation => "translation",
            Stage::Synthesis => "synthesis",
        };
        f.write_str(s)
    }
}

/// The three external stages. Synthesis is optional.
#[derive(Clone)]
pub struct Stages {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Option<Arc<dyn Synthesizer>>,
}

/// Tunables of a [`Relay`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub min_audio_bytes: usize,
    pub max_audio_bytes: usize,
    pub max_concurrent: usize,
    pub history_capacity: usize,
    pub similarity_threshold: f64,
    pub stage_timeout: Duration,
    pub retention: Duration,
    pub sweep_threshold: usize,
    /// Where transient request audio is written
    pub scratch_dir: PathBuf,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            min_audio_bytes: defaults::MIN_AUDIO_BYTES,
            max_audio_bytes: defaults::MAX_AUDIO_BYTES,
            max_concurrent: defaults::MAX_CONCURRENT_REQUESTS,
            history_capacity: defaults::HISTORY_CAPACITY,
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            stage_timeout: Duration::from_millis(defaults::STAGE_TIMEOUT_MS),
            retention: Duration::from_secs(defaults::ARTIFACT_RETENTION_SECS),
            sweep_threshold: defaults::OPPORTUNISTIC_SWEEP_THRESHOLD,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            min_audio_bytes: config.limits.min_audio_bytes,
            max_audio_bytes: config.limits.max_audio_bytes,
            max_concurrent: config.limits.max_concurrent,
            history_capacity: config.dedup.capacity,
            similarity_threshold: config.dedup.threshold,
            stage_timeout: config.stages.timeout(),
            retention: config.cache.retention(),
            sweep_threshold: config.cache.sweep_threshold,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Owns all process-wide relay state.
///
/// Cloning is cheap and shares state; every clone sees the same admission
/// counter, history and artifact registry.
#[derive(Clone)]
pub struct Relay {
    admission: Arc<AdmissionController>,
    dedup: Arc<RecencyDeduplicator>,
    artifacts: Arc<ArtifactCache>,
    stages: Stages,
    settings: Arc<RelaySettings>,
}

impl Relay {
    pub fn new(stages: Stages, artifacts: Arc<ArtifactCache>, settings: RelaySettings) -> Self {
        Self {
            admission: Arc::new(AdmissionController::new(settings.max_concurrent)),
            dedup: Arc::new(RecencyDeduplicator::new(
                settings.history_capacity,
                settings.similarity_threshold,
            )),
            artifacts,
            stages,
            settings: Arc::new(settings),
        }
    }

    /// Build a relay from configuration, creating the artifact directory.
    pub fn from_config(config: &Config, stages: Stages) -> Result<Self> {
        let artifacts = Arc::new(ArtifactCache::open(config.cache.artifact_dir())?);
        Ok(Self::new(stages, artifacts, RelaySettings::from(config)))
    }

    pub fn artifacts(&self) -> &Arc<ArtifactCache> {
        &self.artifacts
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Run one request through the pipeline.
    ///
    /// Never fails: every fault is reported inside the result. The admission
    /// slot and the transient audio file are released on all paths.
    pub async fn process(&self, request: TranslationRequest) -> TranslationResult {
        let started = Instant::now();

        let Some(permit) = self.admission.acquire() else {
            tracing::info!(
                active = self.admission.active(),
                max = self.admission.capacity(),
                "rejecting request, relay busy"
            );
            return TranslationResult::busy(started.elapsed());
        };

        let relay = self.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            relay.run_pipeline(request, started).await
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "unexpected failure while processing request");
                TranslationResult::error(
                    ErrorKind::Unexpected,
                    "An unexpected error occurred",
                    started.elapsed(),
                )
            }
        }
    }

    async fn run_pipeline(&self, request: TranslationRequest, started: Instant) -> TranslationResult {
        let size = request.audio.len();
        let target_lang = request.target_lang.trim().to_string();
        tracing::info!(target_lang = %target_lang, bytes = size, "translation request");

        if size > self.settings.max_audio_bytes {
            let error = RelayError::PayloadTooLarge {
                size,
                max: self.settings.max_audio_bytes,
            };
            tracing::info!(bytes = size, "rejecting oversized payload");
            return TranslationResult::too_large(error.to_string(), started.elapsed());
        }
        if size < self.settings.min_audio_bytes {
            tracing::info!(bytes = size, "payload too small, treating as silence");
            return TranslationResult::empty(started.elapsed());
        }
        if target_lang.is_empty() {
            let error = RelayError::InvalidRequest {
                message: "target language must not be empty".to_string(),
            };
            return TranslationResult::error(
                ErrorKind::Validation,
                error.to_string(),
                started.elapsed(),
            );
        }
        if !language::is_supported(&target_lang) {
            tracing::warn!(target_lang = %target_lang, "target language not in supported table");
        }

        // Removed from disk when dropped, whichever way this function returns.
        let audio_file = match self.persist_audio(&request.audio) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, "failed to persist request audio");
                return TranslationResult::error(
                    ErrorKind::Unexpected,
                    "An unexpected error occurred",
                    started.elapsed(),
                );
            }
        };
        drop(request);

        // Transcription
        let transcription_start = Instant::now();
        let transcriber = Arc::clone(&self.stages.transcriber);
        let audio_path = audio_file.path().to_path_buf();
        let transcript = match self
            .run_stage(Stage::Transcription, move || {
                transcriber.transcribe(&audio_path)
            })
            .await
        {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::error!(error = %e, "transcription failed");
                return TranslationResult::error(
                    ErrorKind::Transcription,
                    e.to_string(),
                    started.elapsed(),
                );
            }
        };
        let transcription_time = transcription_start.elapsed();

        let text = transcript.text.trim().to_string();
        let detected = if transcript.language.trim().is_empty() {
            defaults::UNKNOWN_LANGUAGE.to_string()
        } else {
            transcript.language
        };
        tracing::info!(
            text = %text,
            language = %detected,
            elapsed_ms = transcription_time.as_millis() as u64,
            "transcription complete"
        );

        if text.chars().count() < defaults::MIN_TEXT_CHARS {
            tracing::info!("no meaningful text detected");
            return TranslationResult::success(text, detected, "", started.elapsed());
        }

        if self.dedup.is_similar(&text) {
            tracing::info!(text = %text, "skipping text similar to a recent transcript");
            return TranslationResult::success(text, detected, "", started.elapsed())
                .with_skipped();
        }

        // Translation
        let translation_start = Instant::now();
        let translator = Arc::clone(&self.stages.translator);
        let source_hint = language::resolve(&detected);
        let (source_text, stage_target) = (text.clone(), target_lang.clone());
        let translated = match self
            .run_stage(Stage::Translation, move || {
                translator.translate(&source_text, source_hint, &stage_target)
            })
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                tracing::error!(error = %e, "translation failed");
                return TranslationResult::error(
                    ErrorKind::Translation,
                    e.to_string(),
                    started.elapsed(),
                );
            }
        };
        let translation_time = translation_start.elapsed();
        tracing::info!(
            translated = %translated,
            elapsed_ms = translation_time.as_millis() as u64,
            "translation complete"
        );

        if translated.trim().to_lowercase() == text.to_lowercase() {
            tracing::info!("no translation needed, text already in target language");
            return TranslationResult::success(text, detected, translated, started.elapsed())
                .with_no_translation_needed();
        }

        self.dedup.record(&text);

        // Synthesis
        let mut tts_time = Duration::ZERO;
        let mut audio_output = None;
        if let Some(synthesizer) = self.stages.synthesizer.clone()
            && !translated.trim().is_empty()
        {
            let tts_start = Instant::now();
            let (filename, path) = self.artifacts.new_artifact();
            let (stage_text, stage_lang, stage_path) =
                (translated.clone(), target_lang.clone(), path.clone());
            let synthesized = self
                .run_stage(Stage::Synthesis, move || {
                    synthesizer.synthesize(&stage_text, &stage_lang, &stage_path)
                })
                .await;
            tts_time = tts_start.elapsed();

            match synthesized {
                Ok(()) => {
                    self.artifacts.register(&filename, SystemTime::now());
                    audio_output = Some(path.to_string_lossy().to_string());
                    tracing::info!(
                        artifact = %filename,
                        elapsed_ms = tts_time.as_millis() as u64,
                        "synthesis complete"
                    );
                    self.maybe_sweep();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "synthesis failed, returning text only");
                    self.artifacts.remove(&filename);
                }
            }
        }

        let timing = StageTimings {
            transcription: transcription_time.as_secs_f64(),
            translation: translation_time.as_secs_f64(),
            tts: tts_time.as_secs_f64(),
        };
        let result = TranslationResult::success(text, detected, translated, started.elapsed())
            .with_audio_output(audio_output)
            .with_timing(timing);
        tracing::info!(
            total_ms = started.elapsed().as_millis() as u64,
            "request complete"
        );
        result
    }

    fn persist_audio(&self, audio: &[u8]) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", defaults::APP_NAME))
            .suffix(defaults::TRANSIENT_AUDIO_SUFFIX)
            .tempfile_in(&self.settings.scratch_dir)?;
        file.write_all(audio)?;
        file.flush()?;
        Ok(file)
    }

    /// Run a blocking stage call on the blocking pool under the stage
    /// timeout. Panics and timeouts become stage faults.
    async fn run_stage<T, F>(&self, stage: Stage, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.settings.stage_timeout;
        let outcome = tokio::time::timeout(timeout, tokio::task::spawn_blocking(call)).await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(RelayError::Other(format!(
                "{} stage panicked: {}",
                stage, join_error
            ))),
            Err(_) => Err(RelayError::StageTimeout {
                stage: stage.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };
        result.map_err(|e| stage.fault(e))
    }

    fn maybe_sweep(&self) {
        if self.artifacts.len() > self.settings.sweep_threshold
            && spawn_background_sweep(Arc::clone(&self.artifacts), self.settings.retention)
                .is_some()
        {
            tracing::debug!(
                tracked = self.artifacts.len(),
                "spawned opportunistic artifact sweep"
            );
        }
    }

    /// Current load, history size and stage bindings.
    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            active_requests: self.admission.active(),
            max_concurrent: self.admission.capacity(),
            history_size: self.dedup.len(),
            artifact_count: self.artifacts.len(),
            translation_cache_size: self.stages.translator.cached_translations(),
            stages: StageStatus {
                transcriber: self.stages.transcriber.name().to_string(),
                translator: self.stages.translator.name().to_string(),
                synthesizer: self
                    .stages
                    .synthesizer
                    .as_ref()
                    .map(|s| s.name().to_string()),
            },
        }
    }

    /// Forget all history and delete every tracked artifact.
    pub fn clear(&self) -> ClearReport {
        let report = ClearReport {
            history_cleared: self.dedup.clear(),
            artifacts_removed: self.artifacts.clear(),
            translations_cleared: self.stages.translator.clear_cached_translations(),
        };
        tracing::info!(
            history = report.history_cleared,
            artifacts = report.artifacts_removed,
            translations = report.translations_cleared,
            "relay state cleared"
        );
        report
    }

    /// Reclaim artifacts older than `max_age` (default: configured
    /// retention) on the blocking pool.
    pub async fn sweep(&self, max_age: Option<Duration>) -> SweepReport {
        let max_age = max_age.unwrap_or(self.settings.retention);
        let artifacts = Arc::clone(&self.artifacts);
        match tokio::task::spawn_blocking(move || artifacts.sweep(max_age)).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "artifact sweep failed");
                SweepReport::default()
            }
        }
    }
}
