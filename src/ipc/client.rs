//! IPC client for sending commands to the daemon.

use crate::error::{RelayError, Result};
use crate::ipc::protocol::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send a command to the daemon via Unix socket.
///
/// # Errors
/// Returns `RelayError::IpcConnection` if connection fails
/// Returns `RelayError::IpcProtocol` if serialization/deserialization fails
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!(
                "Failed to connect to daemon at {}: {}",
                socket_path.display(),
                e
            ),
        })?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let command_json = command.to_json().map_err(|e| RelayError::IpcProtocol {
        message: format!("Failed to serialize command: {}", e),
    })?;

    writer
        .write_all(command_json.as_bytes())
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to write command: {}", e),
        })?;

    writer
        .write_all(b"\n")
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to write newline: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to read response: {}", e),
        })?;

    if response_line.trim().is_empty() {
        return Err(RelayError::IpcProtocol {
            message: "Daemon closed the connection without responding".to_string(),
        });
    }

    Response::from_json(response_line.trim()).map_err(|e| RelayError::IpcProtocol {
        message: format!("Failed to deserialize response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::decode_audio;
    use crate::ipc::server::{CommandHandler, IpcServer};
    use crate::relay::TranslationResult;
    use std::time::Duration;
    use tempfile::TempDir;

    // Echoes translate requests back so the payload path can be checked
    struct MockHandler;

    #[async_trait::async_trait]
    impl CommandHandler for MockHandler {
        async fn handle(&self, command: Command) -> Response {
            match command {
                Command::Translate { audio, target_lang } => match decode_audio(&audio) {
                    Ok(bytes) => Response::Translation {
                        result: TranslationResult::success(
                            format!("{} bytes", bytes.len()),
                            "en",
                            target_lang,
                            Duration::ZERO,
                        ),
                    },
                    Err(e) => Response::Error {
                        message: e.to_string(),
                    },
                },
                Command::Sweep { .. } => Response::Swept {
                    removed: 0,
                    untracked_removed: 0,
                },
                Command::Status | Command::ClearCache | Command::Shutdown => Response::Ok,
            }
        }
    }

    async fn start_mock_server(socket_path: &Path) {
        let server_socket_path = socket_path.to_path_buf();
        tokio::spawn(async move {
            let server = IpcServer::new(server_socket_path).unwrap();
            server.start(MockHandler).await
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_send_translate_command() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_mock_server(&socket_path).await;

        let audio = vec![0x42u8; 4096];
        let response = send_command(&socket_path, Command::translate(&audio, "hi"))
            .await
            .unwrap();

        match response {
            Response::Translation { result } => {
                assert_eq!(result.original_text, "4096 bytes");
                assert_eq!(result.translated_text, "hi");
            }
            other => panic!("Expected Translation response, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_command_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_mock_server(&socket_path).await;

        let response = send_command(
            &socket_path,
            Command::Sweep {
                max_age_secs: Some(60),
            },
        )
        .await
        .unwrap();
        assert!(matches!(response, Response::Swept { .. }));
    }

    #[tokio::test]
    async fn test_send_command_connection_failed() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("nonexistent.sock");

        let result = send_command(&socket_path, Command::Status).await;

        match result {
            Err(RelayError::IpcConnection { message }) => {
                assert!(message.contains("Failed to connect to daemon"));
            }
            other => panic!("Expected IpcConnection error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_sequential_commands() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");
        start_mock_server(&socket_path).await;

        for cmd in [Command::Status, Command::ClearCache, Command::Shutdown] {
            let response = send_command(&socket_path, cmd.clone()).await.unwrap();
            assert_eq!(response, Response::Ok, "Unexpected response for {:?}", cmd);
        }
    }
}
