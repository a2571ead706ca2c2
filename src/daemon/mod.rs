//! Daemon mode for lingorelay - owns the relay, the artifact sweeper and
//! the IPC server.

pub mod handler;

use crate::artifacts::spawn_sweeper;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::ipc::server::{IpcServer, max_request_bytes};
use crate::relay::{Relay, Stages};
use crate::stages::{
    CachingTranslator, CommandSynthesizer, CommandTranscriber, CommandTranslator, RetryPolicy,
    RetryingTranslator, Synthesizer, SystemCommandExecutor, Transcriber, Translator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

/// Build the stage set described by `config`.
///
/// Transcriber and translator are required; the synthesizer is optional.
/// The translator is wrapped with the configured retry policy and a
/// bounded memo of recent translations.
pub fn build_stages(config: &Config) -> Result<Stages> {
    let stages = &config.stages;

    let transcriber = stages
        .transcriber
        .as_ref()
        .ok_or_else(|| not_configured("stages.transcriber"))?;
    let translator = stages
        .translator
        .as_ref()
        .ok_or_else(|| not_configured("stages.translator"))?;

    let transcriber: Arc<dyn Transcriber> = Arc::new(CommandTranscriber::new(
        transcriber.clone(),
        SystemCommandExecutor,
    ));
    let translator: Arc<dyn Translator> = Arc::new(CachingTranslator::new(
        RetryingTranslator::new(
            CommandTranslator::new(translator.clone(), SystemCommandExecutor),
            RetryPolicy::from(&stages.retry).with_max_delay(stages.timeout()),
        ),
        stages.translation_cache_size,
    ));
    let synthesizer = stages.synthesizer.as_ref().map(|cmd| {
        Arc::new(CommandSynthesizer::new(cmd.clone(), SystemCommandExecutor))
            as Arc<dyn Synthesizer>
    });

    Ok(Stages {
        transcriber,
        translator,
        synthesizer,
    })
}

fn not_configured(key: &str) -> RelayError {
    RelayError::ConfigInvalidValue {
        key: key.to_string(),
        message: "not configured".to_string(),
    }
}

/// Run the daemon until SIGINT, SIGTERM or a `shutdown` command.
///
/// # Arguments
/// * `config` - Validated configuration
/// * `socket_path` - Path to Unix socket for IPC (default: per-user runtime dir)
pub async fn run_daemon(config: Config, socket_path: Option<PathBuf>) -> Result<()> {
    let stages = build_stages(&config)?;
    serve(config, stages, socket_path).await
}

/// Serve an already-built stage set. Split from [`run_daemon`] so the
/// daemon can be driven with in-process stages.
pub async fn serve(config: Config, stages: Stages, socket_path: Option<PathBuf>) -> Result<()> {
    let relay = Relay::from_config(&config, stages)?;
    tracing::info!(
        artifacts = %relay.artifacts().dir().display(),
        max_concurrent = config.limits.max_concurrent,
        "relay initialized"
    );

    let sweeper = spawn_sweeper(
        Arc::clone(relay.artifacts()),
        config.cache.sweep_interval(),
        config.cache.retention(),
    );

    let socket_path = socket_path
        .or_else(|| config.daemon.socket.clone())
        .unwrap_or_else(IpcServer::default_socket_path);
    let server = Arc::new(
        IpcServer::new(socket_path)?
            .with_max_request_bytes(max_request_bytes(config.limits.max_audio_bytes)),
    );
    tracing::info!(socket = %server.socket_path().display(), "IPC server listening");

    let shutdown = Arc::new(Notify::new());
    let handler = handler::DaemonCommandHandler::new(
        relay.clone(),
        Arc::clone(&shutdown),
        config.limits.default_target_lang.clone(),
    );

    let server_clone = Arc::clone(&server);
    let mut server_handle = tokio::spawn(async move { server_clone.start(handler).await });

    let mut server_finished = false;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                tracing::error!(error = %e, "signal handler setup failed");
            }
            tracing::info!("received SIGTERM, shutting down");
        }
        _ = shutdown.notified() => {
            tracing::info!("shutdown requested over IPC");
        }
        res = &mut server_handle => {
            server_finished = true;
            match res {
                Ok(Ok(())) => tracing::warn!("IPC server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "IPC server failed"),
                Err(e) => tracing::error!(error = %e, "IPC server task failed"),
            }
        }
    }

    server.stop().await?;
    if !server_finished && let Err(e) = server_handle.await {
        tracing::error!(error = %e, "daemon server task failed");
    }
    sweeper.stop().await;

    let cleared = relay.clear();
    tracing::info!(artifacts = cleared.artifacts_removed, "daemon stopped");
    Ok(())
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| RelayError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageCommand;
    use crate::ipc::client::send_command;
    use crate::ipc::protocol::{Command, Response};
    use crate::stages::{MockTranscriber, MockTranslator};
    use std::time::Duration;
    use tempfile::TempDir;

    fn command(program: &str) -> StageCommand {
        StageCommand {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn test_build_stages_requires_transcriber() {
        let mut config = Config::default();
        config.stages.translator = Some(command("mt"));

        match build_stages(&config) {
            Err(RelayError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "stages.transcriber")
            }
            Err(other) => panic!("Expected ConfigInvalidValue, got: {:?}", other),
            Ok(_) => panic!("Expected error for missing transcriber"),
        }
    }

    #[test]
    fn test_build_stages_requires_translator() {
        let mut config = Config::default();
        config.stages.transcriber = Some(command("asr"));

        match build_stages(&config) {
            Err(RelayError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "stages.translator")
            }
            Err(other) => panic!("Expected ConfigInvalidValue, got: {:?}", other),
            Ok(_) => panic!("Expected error for missing translator"),
        }
    }

    #[test]
    fn test_build_stages_synthesizer_optional() {
        let mut config = Config::default();
        config.stages.transcriber = Some(command("asr"));
        config.stages.translator = Some(command("mt"));

        let stages = build_stages(&config).unwrap();
        assert_eq!(stages.transcriber.name(), "asr");
        assert!(stages.synthesizer.is_none());

        config.stages.synthesizer = Some(command("tts"));
        let stages = build_stages(&config).unwrap();
        assert_eq!(stages.synthesizer.map(|s| s.name().to_string()), Some("tts".to_string()));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_command() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("relay.sock");
        let mut config = Config::default();
        config.cache.dir = Some(temp_dir.path().join("artifacts"));

        let stages = Stages {
            transcriber: Arc::new(MockTranscriber::new("mock-asr")),
            translator: Arc::new(MockTranslator::new("mock-mt")),
            synthesizer: None,
        };

        let daemon = tokio::spawn(serve(config, stages, Some(socket_path.clone())));
        tokio::time::sleep(Duration::from_millis(100)).await;

        match send_command(&socket_path, Command::Status).await.unwrap() {
            Response::Status { status } => {
                assert_eq!(status.stages.transcriber, "mock-asr");
                assert_eq!(status.active_requests, 0);
            }
            other => panic!("Expected Status response, got: {:?}", other),
        }

        let response = send_command(&socket_path, Command::Shutdown).await.unwrap();
        assert_eq!(response, Response::Ok);

        let result = tokio::time::timeout(Duration::from_secs(2), daemon)
            .await
            .expect("daemon should stop after shutdown command")
            .unwrap();
        assert!(result.is_ok());
        assert!(!socket_path.exists());
    }
}
