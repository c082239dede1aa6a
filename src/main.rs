// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Snapscribe CLI: watch a screenshot directory and rename new images from
//! AI-generated descriptions.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use snapscribe::classifier::{Classifier, VisionClient};
use snapscribe::config::AppConfig;
use snapscribe::history::{History, HistoryEntry};
use snapscribe::pipeline::WatchSession;
use snapscribe::rename::{self, sanitize_name, target_path, RenameOutcome};
use snapscribe::watcher::{is_candidate, DirAccess};
use snapscribe::{Result, SnapscribeError};

/// Snapscribe - AI screenshot watcher & renamer
#[derive(Parser, Debug)]
#[command(name = "snapscribe")]
#[command(version = "0.3.0")]
#[command(about = "Watches a directory and renames new screenshots from AI descriptions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "snapscribe.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the configured directory and rename new screenshots
    Watch {
        /// Directory to watch (overrides config)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Dry run mode (don't actually rename files)
        #[arg(long)]
        dry_run: bool,

        /// Skip classifier health check on startup
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Classify and rename a single file
    Name {
        /// Image file to rename
        path: PathBuf,

        /// Dry run mode (show the suggestion without renaming)
        #[arg(long)]
        dry_run: bool,
    },

    /// History and undo operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show classifier status
    Status,
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent renames
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Undo recent renames
    Undo {
        /// Number of renames to undo
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Dry run (show what would be undone)
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear the rename journal
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "snapscribe.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Watch {
            dir,
            dry_run,
            skip_health_check,
        }) => run_watch(config, dir, dry_run, skip_health_check).await,
        Some(Commands::Name { path, dry_run }) => run_name(config, path, dry_run).await,
        Some(Commands::History { action }) => run_history_command(config, action).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config).await,
        Some(Commands::Status) => run_status(config).await,
        None => run_watch(config, None, false, false).await,
    }
}

/// Run the watch mode (main loop)
async fn run_watch(
    mut config: AppConfig,
    dir_override: Option<PathBuf>,
    dry_run: bool,
    skip_health_check: bool,
) -> Result<()> {
    if let Some(dir) = dir_override {
        config.watch_dir = dir.to_string_lossy().to_string();
    }

    info!("Watch directory: {}", config.watch_dir);

    if dry_run {
        warn!("DRY RUN MODE - files will not be renamed");
    }

    let client = VisionClient::new(&config.classifier)?;

    if !skip_health_check {
        info!("Checking classifier availability...");
        client.health_check().await?;
        info!("Classifier reachable at {}", config.classifier.url);
    } else {
        warn!("Skipping classifier health check");
    }

    let scope = Arc::new(DirAccess::new(PathBuf::from(&config.watch_dir)));
    let session = WatchSession::start(&config, Arc::new(client), scope, dry_run)?;

    info!("Watcher active. Press Ctrl+C to stop.");

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }

    session.shutdown().await;
    info!("Snapscribe stopped.");
    Ok(())
}

/// Classify and rename a single file, outside any watch session
async fn run_name(config: AppConfig, path: PathBuf, dry_run: bool) -> Result<()> {
    if !is_candidate(&path) {
        return Err(SnapscribeError::Config(format!(
            "{:?} is not a visible image file",
            path
        )));
    }

    let client = VisionClient::new(&config.classifier)?;
    let bytes = tokio::fs::read(&path).await?;
    let suggestion = client.describe(&bytes).await?;
    info!("Suggestion: {}", suggestion);

    let stem = sanitize_name(&suggestion, config.rules.max_length);
    if stem.is_empty() {
        return Err(SnapscribeError::Config(format!(
            "Classifier output {:?} contains nothing usable as a filename",
            suggestion
        )));
    }

    let target = target_path(&path, &stem).ok_or_else(|| {
        SnapscribeError::Config(format!("Cannot determine parent directory of {:?}", path))
    })?;

    if dry_run {
        println!("Would rename {} -> {}", path.display(), target.display());
        return Ok(());
    }

    match rename::execute(&path, &target)? {
        RenameOutcome::Renamed { from, to } => {
            println!("Renamed {} -> {}", from.display(), to.display());
            if config.history.enabled {
                let history = History::new(PathBuf::from(&config.history.path));
                history.append(&HistoryEntry::record(from, to, suggestion))?;
            }
        }
        RenameOutcome::Unchanged => println!("Already named {}", path.display()),
        RenameOutcome::Collision { target } => {
            println!(
                "Target {} already exists, leaving {} untouched",
                target.display(),
                path.display()
            );
        }
        RenameOutcome::SourceVanished => println!("File vanished before rename"),
    }

    Ok(())
}

/// Run history commands
async fn run_history_command(config: AppConfig, action: HistoryCommands) -> Result<()> {
    let history = History::new(PathBuf::from(&config.history.path));

    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            println!("Recent renames ({} entries):", entries.len());
            for entry in entries {
                let status = if entry.undone { "[UNDONE]" } else { "" };
                println!(
                    "  {} {} -> {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.original_path.display(),
                    entry.new_path.display(),
                    status
                );
            }
        }
        HistoryCommands::Undo { count, dry_run } => {
            let entries = history.get_undoable()?;
            let to_undo: Vec<_> = entries.into_iter().rev().take(count).collect();

            if to_undo.is_empty() {
                println!("No renames to undo");
                return Ok(());
            }

            for entry in to_undo {
                if entry.new_path.exists() {
                    if dry_run {
                        println!(
                            "Would undo: {} -> {}",
                            entry.new_path.display(),
                            entry.original_path.display()
                        );
                    } else {
                        std::fs::rename(&entry.new_path, &entry.original_path)?;
                        history.mark_undone(&entry.id)?;
                        println!(
                            "Undone: {} -> {}",
                            entry.new_path.display(),
                            entry.original_path.display()
                        );
                    }
                } else {
                    warn!(
                        "File not found (may have been moved/deleted): {:?}",
                        entry.new_path
                    );
                }
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

/// Run config commands
async fn run_config_command(
    config: AppConfig,
    action: ConfigCommands,
    config_path: &Path,
) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Watch directory: {}", config.watch_dir);
            println!("  Classifier: {} ({})", config.classifier.url, config.classifier.model);
            println!(
                "  Debounce: {}ms, poll every {}ms (max {} attempts), ledger TTL {}ms",
                config.tuning.debounce_ms,
                config.tuning.poll_interval_ms,
                config.tuning.poll_attempts,
                config.tuning.ledger_ttl_ms
            );
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("Snapscribe v0.3.0 Status");
    println!("========================");

    let client = VisionClient::new(&config.classifier)?;
    match client.health_check().await {
        Ok(()) => println!("Classifier: reachable at {}", config.classifier.url),
        Err(e) => println!("Classifier: error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Watch directory: {}", config.watch_dir);
    println!("  Model: {}", config.classifier.model);
    println!("  History journal: {}", config.history.path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["snapscribe"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_watch_command() {
        let cli =
            Cli::try_parse_from(["snapscribe", "watch", "--dry-run", "--dir", "/tmp/shots"])
                .unwrap();

        match cli.command {
            Some(Commands::Watch { dry_run, dir, .. }) => {
                assert!(dry_run);
                assert_eq!(dir, Some(PathBuf::from("/tmp/shots")));
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_name_command() {
        let cli = Cli::try_parse_from(["snapscribe", "name", "/tmp/shot.png", "--dry-run"]).unwrap();

        match cli.command {
            Some(Commands::Name { path, dry_run }) => {
                assert!(dry_run);
                assert_eq!(path, PathBuf::from("/tmp/shot.png"));
            }
            _ => panic!("Expected Name command"),
        }
    }

    #[test]
    fn test_cli_history_undo() {
        let cli = Cli::try_parse_from(["snapscribe", "history", "undo", "-n", "3"]).unwrap();

        match cli.command {
            Some(Commands::History {
                action: HistoryCommands::Undo { count, dry_run },
            }) => {
                assert_eq!(count, 3);
                assert!(!dry_run);
            }
            _ => panic!("Expected History undo command"),
        }
    }
}
