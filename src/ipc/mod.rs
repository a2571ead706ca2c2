//! Unix-socket JSON-lines IPC between the CLI and the relay daemon.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::send_command;
pub use protocol::{Command, Response};
pub use server::{CommandHandler, IpcServer};
