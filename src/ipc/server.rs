//! Async Unix socket IPC server for the relay daemon.

use crate::defaults;
use crate::error::{RelayError, Result};
use crate::ipc::protocol::{Command, Response};
use crate::relay::TranslationResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

/// Handler trait for processing IPC commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return a response.
    async fn handle(&self, command: Command) -> Response;
}

/// State for managing server shutdown.
#[derive(Debug, Clone)]
struct ServerState {
    shutdown: Arc<Mutex<bool>>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            shutdown: Arc::new(Mutex::new(false)),
        }
    }

    async fn is_shutdown(&self) -> bool {
        *self.shutdown.lock().await
    }

    async fn set_shutdown(&self) {
        *self.shutdown.lock().await = true;
    }
}

/// IPC server for handling relay commands via Unix socket.
pub struct IpcServer {
    socket_path: PathBuf,
    max_request_bytes: u64,
    state: ServerState,
}

/// Largest request line accepted for a given audio payload limit: the
/// base64 expansion of the payload plus room for the JSON envelope.
pub fn max_request_bytes(max_audio_bytes: usize) -> u64 {
    (max_audio_bytes as u64).div_ceil(3) * 4 + 4096
}

impl IpcServer {
    /// Create a new IPC server bound to the specified socket path.
    pub fn new(socket_path: PathBuf) -> Result<Self> {
        Ok(Self {
            socket_path,
            max_request_bytes: max_request_bytes(defaults::MAX_AUDIO_BYTES),
            state: ServerState::new(),
        })
    }

    /// Override the maximum accepted request line size.
    pub fn with_max_request_bytes(mut self, max_request_bytes: u64) -> Self {
        self.max_request_bytes = max_request_bytes;
        self
    }

    /// Get the socket path this server is using.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Get the default socket path based on XDG_RUNTIME_DIR or fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join(format!("{}.sock", defaults::APP_NAME))
        } else {
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/{}-{}.sock", defaults::APP_NAME, uid))
        }
    }

    /// Start the IPC server and handle incoming connections.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        // Clean up any stale socket file
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| RelayError::IpcSocket {
                message: format!("Failed to remove existing socket: {}", e),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| RelayError::IpcSocket {
                message: format!("Failed to bind to socket: {}", e),
            })?;
        tracing::debug!(socket = %self.socket_path.display(), "IPC server bound");

        let handler = Arc::new(handler);

        loop {
            if self.state.is_shutdown().await {
                break;
            }

            // Accept with timeout so the shutdown flag is re-checked
            let accept_result =
                tokio::time::timeout(tokio::time::Duration::from_millis(100), listener.accept())
                    .await;

            match accept_result {
                Ok(Ok((stream, _))) => {
                    let handler = Arc::clone(&handler);
                    let max_request_bytes = self.max_request_bytes;
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler, max_request_bytes).await {
                            tracing::warn!(error = %e, "error handling IPC client");
                        }
                    });
                }
                Ok(Err(e)) => {
                    return Err(RelayError::IpcConnection {
                        message: format!("Failed to accept connection: {}", e),
                    });
                }
                Err(_) => continue,
            }
        }

        Ok(())
    }

    /// Stop the IPC server and clean up the socket file.
    pub async fn stop(&self) -> Result<()> {
        self.state.set_shutdown().await;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| RelayError::IpcSocket {
                message: format!("Failed to remove socket file: {}", e),
            })?;
        }

        Ok(())
    }
}

/// Handle a single client connection: one command line, one response line.
async fn handle_client<H>(stream: UnixStream, handler: Arc<H>, max_request_bytes: u64) -> Result<()>
where
    H: CommandHandler + 'static,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(max_request_bytes));
    let mut line = String::new();

    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to read from client: {}", e),
        })?;

    let response = if read as u64 >= max_request_bytes && !line.ends_with('\n') {
        // Only translate requests carry payloads this large.
        let mut rest = reader.into_inner().into_inner();
        let drain_timeout = Duration::from_millis(defaults::IPC_DRAIN_TIMEOUT_MS);
        match tokio::time::timeout(drain_timeout, discard_line(&mut rest)).await {
            Ok(Ok(discarded)) => {
                tracing::warn!(limit = max_request_bytes, discarded, "oversized request rejected")
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to drain oversized request"),
            Err(_) => tracing::warn!("timed out draining oversized request"),
        }
        Response::Translation {
            result: TranslationResult::too_large(
                format!("Request exceeds {} bytes", max_request_bytes),
                Duration::ZERO,
            ),
        }
    } else {
        match Command::from_json(line.trim()) {
            Ok(command) => dispatch(handler, command).await,
            Err(e) => Response::Error {
                message: format!("Failed to parse command: {}", e),
            },
        }
    };

    let response_json = response.to_json().map_err(|e| RelayError::IpcProtocol {
        message: format!("Failed to serialize response: {}", e),
    })?;

    writer
        .write_all(response_json.as_bytes())
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to write to client: {}", e),
        })?;

    writer
        .write_all(b"\n")
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to write newline to client: {}", e),
        })?;

    writer
        .flush()
        .await
        .map_err(|e| RelayError::IpcConnection {
            message: format!("Failed to flush writer: {}", e),
        })?;

    Ok(())
}

/// Read and drop bytes up to and including the next newline, or to EOF.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 8192];
    let mut discarded = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(discarded);
        }
        discarded += n as u64;
        if buf[..n].contains(&b'\n') {
            return Ok(discarded);
        }
    }
}

/// Run the handler on its own task so a panic becomes an error response
/// instead of a dropped connection.
async fn dispatch<H>(handler: Arc<H>, command: Command) -> Response
where
    H: CommandHandler + 'static,
{
    match tokio::spawn(async move { handler.handle(command).await }).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "command handler failed");
            Response::Error {
                message: "Internal error while handling command".to_string(),
            }
        }
    }
}
