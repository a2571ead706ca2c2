use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use lingorelay::cli::{Cli, Commands, ConfigAction};
use lingorelay::config::Config;
use lingorelay::daemon::run_daemon;
use lingorelay::ipc::client::send_command;
use lingorelay::ipc::protocol::{Command, Response};
use lingorelay::ipc::server::IpcServer;
use lingorelay::logging::init_logging;
use lingorelay::relay::{ResultStatus, TranslationResult};
use lingorelay::stages::language::SUPPORTED_LANGUAGES;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Daemon { socket } => {
            let config = load_config(cli.config.as_deref())?;
            run_daemon(config, socket).await?;
        }
        Commands::Translate {
            file,
            target,
            json,
            socket,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let audio = std::fs::read(&file)
                .with_context(|| format!("Failed to read audio file {}", file.display()))?;
            let target = target.unwrap_or_else(|| config.limits.default_target_lang.clone());
            let socket = resolve_socket(socket, &config);
            handle_ipc_command(&socket, Command::translate(&audio, &target), json).await?;
        }
        Commands::Status { socket } => {
            let socket = resolve_socket(socket, &load_config(cli.config.as_deref())?);
            handle_ipc_command(&socket, Command::Status, false).await?;
        }
        Commands::ClearCache { socket } => {
            let socket = resolve_socket(socket, &load_config(cli.config.as_deref())?);
            handle_ipc_command(&socket, Command::ClearCache, false).await?;
        }
        Commands::Sweep { max_age, socket } => {
            let socket = resolve_socket(socket, &load_config(cli.config.as_deref())?);
            let command = Command::Sweep {
                max_age_secs: max_age.map(|d| d.as_secs()),
            };
            handle_ipc_command(&socket, command, false).await?;
        }
        Commands::Shutdown { socket } => {
            let socket = resolve_socket(socket, &load_config(cli.config.as_deref())?);
            handle_ipc_command(&socket, Command::Shutdown, false).await?;
        }
        Commands::Languages => {
            for lang in SUPPORTED_LANGUAGES {
                println!("  {}  {}", lang.code.green(), lang.display_name());
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "lingorelay",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/lingorelay/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Socket path: `--socket`, then `daemon.socket` from config, then the
/// per-user default.
fn resolve_socket(socket: Option<PathBuf>, config: &Config) -> PathBuf {
    socket
        .or_else(|| config.daemon.socket.clone())
        .unwrap_or_else(IpcServer::default_socket_path)
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                eprintln!(
                    "{}",
                    format!(
                        "Config already exists at {} (use --force to overwrite)",
                        config_path.display()
                    )
                    .yellow()
                );
                std::process::exit(1);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&config_path, Config::default().to_toml()?)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            println!("{} {}", "Wrote".green(), config_path.display());
        }
    }
    Ok(())
}

/// Send IPC command to daemon and handle response.
async fn handle_ipc_command(socket_path: &Path, command: Command, json: bool) -> Result<()> {
    match send_command(socket_path, command).await {
        Ok(response) => match response {
            Response::Ok => {
                println!("{}", "OK".green());
            }
            Response::Translation { result } => {
                if json {
                    println!("{}", result.to_json()?);
                } else {
                    print_translation(&result);
                }
                if !result.is_success() {
                    std::process::exit(1);
                }
            }
            Response::Status { status } => {
                println!("Status:");
                println!("  {}    {}", "Client:".dimmed(), lingorelay::version_string());
                println!(
                    "  {}      {}/{}",
                    "Load:".dimmed(),
                    status.active_requests,
                    status.max_concurrent
                );
                println!("  {}   {}", "History:".dimmed(), status.history_size);
                println!("  {} {}", "Artifacts:".dimmed(), status.artifact_count);
                println!(
                    "  {}  {}",
                    "Memoized:".dimmed(),
                    status.translation_cache_size
                );
                println!(
                    "  {}    {} → {} → {}",
                    "Stages:".dimmed(),
                    status.stages.transcriber,
                    status.stages.translator,
                    status.stages.synthesizer.as_deref().unwrap_or("(none)")
                );
            }
            Response::Cleared { report } => {
                println!(
                    "{} {} history entries, {} artifacts, {} translations",
                    "Cleared".green(),
                    report.history_cleared,
                    report.artifacts_removed,
                    report.translations_cleared
                );
            }
            Response::Swept {
                removed,
                untracked_removed,
            } => {
                println!(
                    "{} {} artifacts ({} untracked)",
                    "Swept".green(),
                    removed,
                    untracked_removed
                );
            }
            Response::Error { message } => {
                eprintln!("{}", format!("Error: {}", message).red());
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to communicate with daemon: {}", e).red()
            );
            eprintln!("Is the daemon running? Start it with: lingorelay daemon");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_translation(result: &TranslationResult) {
    match result.status {
        ResultStatus::Success => {
            if result.skipped {
                println!("{}", "(duplicate, skipped)".dimmed());
                return;
            }
            if result.original_text.is_empty() {
                println!("{}", "(no speech)".dimmed());
                return;
            }
            println!(
                "{} [{}] {}",
                "Heard:".dimmed(),
                result.detected_language,
                result.original_text
            );
            if result.no_translation_needed {
                println!("{}", "(already in target language)".dimmed());
            } else {
                println!("{} {}", "Translated:".green(), result.translated_text);
            }
            if let Some(audio) = &result.audio_output {
                println!("{} {}", "Audio:".dimmed(), audio);
            }
            println!(
                "{} {:.2}s",
                "Took:".dimmed(),
                result.processing_time
            );
        }
        ResultStatus::Busy => {
            eprintln!(
                "{}",
                result.message.as_deref().unwrap_or("Server busy").yellow()
            );
        }
        ResultStatus::Error => {
            eprintln!(
                "{}",
                format!("Error: {}", result.message.as_deref().unwrap_or("unknown")).red()
            );
        }
    }
}
