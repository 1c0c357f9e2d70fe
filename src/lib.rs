//! Registers an application's data directory with an external backup
//! transfer mechanism.
//!
//! [`manifest`] walks the data directory into a list of relative file paths
//! and preference set names. [`coordinator`] runs backup and restore over
//! that list, one at a time, behind an injected [`BackupLock`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod manifest;
pub mod scheduler;
pub mod watcher;

pub use coordinator::{BackupAgent, BackupCoordinator, BackupGuard, BackupLock, TransferMechanism};
pub use manifest::{Group, Manifest, ManifestBuilder, ManifestEntry, ManifestRules, SuffixPolicy};
pub use scheduler::{BackupScheduler, RestoreObserver, ThreadScheduler};

use clap::Parser;
use cli::{Cli, Commands, ConfigCommand};

/// Runs the command line entry point.
pub fn run() -> Result<(), String> {
    run_cli(Cli::parse())
}

/// Runs an already parsed command line.
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let config_path = cli.config_path();
    let config = config::load_config_from_path(&config_path);

    match cli.command {
        Commands::Manifest { dir } => {
            let data_dir = commands::resolve_data_dir(dir.as_deref(), &config)?;
            println!("{}", commands::manifest_command(&data_dir, &config)?);
        }
        Commands::Watch { dir } => {
            let data_dir = commands::resolve_data_dir(dir.as_deref(), &config)?;
            let stop = commands::stop_signal()?;
            let session = commands::watch_command(&data_dir, &config)?;
            println!("Watching {:?}. Press Ctrl+C to stop.", data_dir);

            let status = commands::run_until_stopped(&session, &stop);
            println!(
                "Completed {} backup(s), {} failure(s).",
                status.backups_completed, status.failures
            );
        }
        Commands::Config {
            command: ConfigCommand::Show,
        } => println!("{}", commands::config_show_command(&config)?),
        Commands::Config {
            command: ConfigCommand::SetDataDir { dir },
        } => {
            let updated = commands::set_data_dir_command(&config_path, config, &dir)?;
            println!(
                "Data directory set to {} in {:?}",
                updated.data_dir.unwrap_or_default(),
                config_path
            );
        }
    }

    Ok(())
}
