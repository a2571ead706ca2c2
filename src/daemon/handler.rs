//! Command handler implementation for the daemon.

use crate::ipc::protocol::{Command, Response, decode_audio};
use crate::ipc::server::CommandHandler;
use crate::relay::{Relay, TranslationRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Command handler for daemon IPC commands.
pub struct DaemonCommandHandler {
    relay: Relay,
    shutdown: Arc<Notify>,
    default_target: String,
}

impl DaemonCommandHandler {
    /// Creates a new command handler.
    ///
    /// `shutdown` is notified when a client sends [`Command::Shutdown`].
    pub fn new(relay: Relay, shutdown: Arc<Notify>, default_target: String) -> Self {
        Self {
            relay,
            shutdown,
            default_target,
        }
    }

    /// Decode the payload and run it through the relay.
    async fn translate(&self, audio: String, target_lang: String) -> Response {
        let audio = match decode_audio(&audio) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Response::Error {
                    message: format!("Invalid audio payload: {}", e),
                };
            }
        };

        let target_lang = if target_lang.trim().is_empty() {
            self.default_target.clone()
        } else {
            target_lang
        };

        let result = self
            .relay
            .process(TranslationRequest::new(audio, target_lang))
            .await;
        Response::Translation { result }
    }
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Translate { audio, target_lang } => {
                self.translate(audio, target_lang).await
            }
            Command::Status => Response::Status {
                status: self.relay.status(),
            },
            Command::ClearCache => Response::Cleared {
                report: self.relay.clear(),
            },
            Command::Sweep { max_age_secs } => self
                .relay
                .sweep(max_age_secs.map(Duration::from_secs))
                .await
                .into(),
            Command::Shutdown => {
                self.shutdown.notify_one();
                Response::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArtifactCache;
    use crate::relay::{ErrorKind, RelaySettings, ResultStatus, Stages};
    use crate::stages::{MockSynthesizer, MockTranscriber, MockTranslator};
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct TestHandler {
        handler: DaemonCommandHandler,
        shutdown: Arc<Notify>,
        _dirs: (TempDir, TempDir),
    }

    fn create_test_handler() -> TestHandler {
        let artifacts_dir = TempDir::new().unwrap();
        let scratch_dir = TempDir::new().unwrap();
        let stages = Stages {
            transcriber: Arc::new(MockTranscriber::new("mock-asr").with_response("hello there", "en")),
            translator: Arc::new(MockTranslator::new("mock-mt").with_response("नमस्ते")),
            synthesizer: Some(Arc::new(MockSynthesizer::new("mock-tts"))),
        };
        let relay = Relay::new(
            stages,
            Arc::new(ArtifactCache::open(artifacts_dir.path()).unwrap()),
            RelaySettings {
                scratch_dir: scratch_dir.path().to_path_buf(),
                ..RelaySettings::default()
            },
        );
        let shutdown = Arc::new(Notify::new());
        TestHandler {
            handler: DaemonCommandHandler::new(relay, Arc::clone(&shutdown), "hi".to_string()),
            shutdown,
            _dirs: (artifacts_dir, scratch_dir),
        }
    }

    #[tokio::test]
    async fn test_handler_translate() {
        let t = create_test_handler();
        let response = t
            .handler
            .handle(Command::translate(&[0x1a; 2048], "hi"))
            .await;

        match response {
            Response::Translation { result } => {
                assert_eq!(result.status, ResultStatus::Success);
                assert_eq!(result.original_text, "hello there");
                assert_eq!(result.translated_text, "नमस्ते");
                assert!(result.audio_output.is_some());
            }
            other => panic!("Expected Translation response, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_translate_rejects_bad_base64() {
        let t = create_test_handler();
        let response = t
            .handler
            .handle(Command::Translate {
                audio: "not base64!".to_string(),
                target_lang: "hi".to_string(),
            })
            .await;

        match response {
            Response::Error { message } => assert!(message.starts_with("Invalid audio payload")),
            other => panic!("Expected Error response, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_translate_empty_target_uses_default() {
        let t = create_test_handler();
        let response = t.handler.handle(Command::translate(&[0x1a; 2048], "  ")).await;

        match response {
            Response::Translation { result } => {
                assert_eq!(result.status, ResultStatus::Success);
                assert_ne!(result.error_kind, Some(ErrorKind::Validation));
            }
            other => panic!("Expected Translation response, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_status() {
        let t = create_test_handler();
        match t.handler.handle(Command::Status).await {
            Response::Status { status } => {
                assert_eq!(status.active_requests, 0);
                assert_eq!(status.max_concurrent, 3);
                assert_eq!(status.stages.translator, "mock-mt");
                assert_eq!(status.stages.synthesizer.as_deref(), Some("mock-tts"));
            }
            other => panic!("Expected Status response, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_clear_cache() {
        let t = create_test_handler();
        t.handler.handle(Command::translate(&[0x1a; 2048], "hi")).await;

        match t.handler.handle(Command::ClearCache).await {
            Response::Cleared { report } => {
                assert_eq!(report.history_cleared, 1);
                assert_eq!(report.artifacts_removed, 1);
            }
            other => panic!("Expected Cleared response, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_sweep_with_max_age() {
        let t = create_test_handler();
        let artifacts = t.handler.relay.artifacts();
        let (stale, path) = artifacts.new_artifact();
        std::fs::write(&path, b"ID3").unwrap();
        artifacts.register(&stale, SystemTime::now() - Duration::from_secs(120));

        let response = t
            .handler
            .handle(Command::Sweep {
                max_age_secs: Some(60),
            })
            .await;

        assert_eq!(
            response,
            Response::Swept {
                removed: 1,
                untracked_removed: 0
            }
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_handler_shutdown_notifies() {
        let t = create_test_handler();
        let response = t.handler.handle(Command::Shutdown).await;
        assert_eq!(response, Response::Ok);

        tokio::time::timeout(Duration::from_millis(100), t.shutdown.notified())
            .await
            .expect("shutdown should have been signalled");
    }
}
