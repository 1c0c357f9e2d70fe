//! Command line definitions

use crate::config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "eidos")]
#[command(author, version, about = "Registers an application data directory for backup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: eidos.json next to the executable)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the backup manifest of a data directory as JSON
    Manifest {
        /// Data directory (default: data_dir from the configuration)
        dir: Option<PathBuf>,
    },

    /// Run a dry-run backup whenever a data directory settles after a change
    Watch {
        /// Data directory (default: data_dir from the configuration)
        dir: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,

    /// Check that DIR is a directory and store it as the data directory
    SetDataDir {
        /// Directory to back up
        dir: PathBuf,
    },
}

impl Cli {
    /// Returns the configuration file chosen on the command line, or the default one.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config::get_config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_metadata_comes_from_package() {
        let command = Cli::command();
        assert_eq!(command.get_author(), Some("Bryan Emmanuel"));
        assert_eq!(command.get_version(), Some(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_parse_manifest() {
        let cli = Cli::try_parse_from(["eidos", "manifest"]).unwrap();
        assert!(matches!(cli.command, Commands::Manifest { dir: None }));
        assert_eq!(cli.config_path(), config::get_config_path());

        let cli = Cli::try_parse_from(["eidos", "manifest", "/data/app"]).unwrap();
        match cli.command {
            Commands::Manifest { dir } => assert_eq!(dir, Some(PathBuf::from("/data/app"))),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_set_data_dir() {
        let cli = Cli::try_parse_from([
            "eidos",
            "config",
            "set-data-dir",
            "/data/app",
            "--config",
            "custom.json",
        ])
        .unwrap();

        assert_eq!(cli.config_path(), PathBuf::from("custom.json"));
        match cli.command {
            Commands::Config {
                command: ConfigCommand::SetDataDir { dir },
            } => assert_eq!(dir, PathBuf::from("/data/app")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Cli::try_parse_from(["eidos"]).is_err());
        assert!(Cli::try_parse_from(["eidos", "restore"]).is_err());
        assert!(Cli::try_parse_from(["eidos", "config", "set-data-dir"]).is_err());
    }
}
