//! Command-line interface for lingorelay
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Speech-to-speech translation relay
#[derive(Parser, Debug)]
#[command(
    name = "lingorelay",
    version,
    about = "Speech-to-speech translation relay: transcribe, translate, synthesize"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logs, -vv: trace logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`, `2m30s`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the relay daemon (foreground process for systemd)
    Daemon {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/lingorelay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Translate a recorded audio file via the daemon
    Translate {
        /// Audio file to translate
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target language code (default: from config, usually hi)
        #[arg(long, short = 't', value_name = "LANG")]
        target: Option<String>,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/lingorelay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Show daemon load, history and artifact counts
    Status {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/lingorelay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Clear duplicate history and delete synthesized audio
    ClearCache {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/lingorelay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Delete synthesized audio older than the retention period now
    Sweep {
        /// Maximum artifact age (default: configured retention). Examples: 30s, 5m, 1h
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        max_age: Option<Duration>,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/lingorelay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Ask the daemon to shut down
    Shutdown {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/lingorelay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List supported target languages
    Languages,

    /// View and create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
