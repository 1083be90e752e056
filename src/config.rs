// Config - Command-line and environment configuration shared by both binaries

use crate::locale::Language;
use crate::medicine::Collection;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Options every entry point understands.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite database holding the medicine collections
    #[arg(long, env = "MEDSYNC_DB", default_value = "medsync.db", global = true)]
    pub db: PathBuf,

    /// Store collection for the generic product list
    #[arg(long, env = "MEDSYNC_PRODUCTS_COLLECTION", default_value = "medicine-1", global = true)]
    pub products_collection: String,

    /// Store collection for the Jan Aushadhi list
    #[arg(long, env = "MEDSYNC_JAN_AUSHADHI_COLLECTION", default_value = "medicine-2", global = true)]
    pub jan_aushadhi_collection: String,

    /// How often the database is checked for changes, in milliseconds
    #[arg(long, env = "MEDSYNC_POLL_MS", default_value = "1000", global = true)]
    pub poll_ms: u64,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(name = "medsync")]
#[command(about = "Pharmacy medicine inventory: import exports and browse stock")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Import a CSV inventory export into a collection
    Import {
        /// Which list the export belongs to
        #[arg(value_enum)]
        collection: Collection,

        /// Path to the CSV export
        csv: PathBuf,

        /// Drop the collection's current documents first
        #[arg(long)]
        replace: bool,
    },
    /// Browse the inventory in the terminal (default)
    Browse {
        /// Initial display language
        #[arg(long, default_value = "english")]
        language: Language,
    },
}

#[derive(Parser, Debug)]
#[command(name = "medsync-server")]
#[command(about = "JSON API over the pharmacy medicine inventory")]
pub struct ServerCli {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Address the HTTP API listens on
    #[arg(long, env = "MEDSYNC_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub products_collection: String,
    pub jan_aushadhi_collection: String,
    pub poll_interval: Duration,
    pub verbose: bool,
}

impl Config {
    pub fn from_args(args: &StoreArgs) -> Self {
        Self {
            db_path: args.db.clone(),
            products_collection: args.products_collection.clone(),
            jan_aushadhi_collection: args.jan_aushadhi_collection.clone(),
            poll_interval: Duration::from_millis(args.poll_ms.max(50)),
            verbose: args.verbose,
        }
    }

    /// Store collection name backing `collection`.
    pub fn collection_name(&self, collection: Collection) -> &str {
        match collection {
            Collection::Products => &self.products_collection,
            Collection::JanAushadhi => &self.jan_aushadhi_collection,
        }
    }

    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("medsync.db"),
            products_collection: Collection::Products.default_name().to_string(),
            jan_aushadhi_collection: Collection::JanAushadhi.default_name().to_string(),
            poll_interval: Duration::from_millis(1000),
            verbose: false,
        }
    }
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Log to stderr. `RUST_LOG` overrides the level picked by `--verbose`.
pub fn init_logging(config: &Config) {
    FmtSubscriber::builder()
        .with_env_filter(env_filter(config.log_level()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Log to a file; used while the terminal UI owns the screen.
pub fn init_file_logging(config: &Config, path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    FmtSubscriber::builder()
        .with_env_filter(env_filter(config.log_level()))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["medsync"]).unwrap();
        assert!(cli.command.is_none());

        let config = Config::from_args(&cli.store);
        assert_eq!(config.collection_name(Collection::Products), "medicine-1");
        assert_eq!(config.collection_name(Collection::JanAushadhi), "medicine-2");
    }

    #[test]
    fn test_import_command() {
        let cli = Cli::try_parse_from([
            "medsync",
            "--db",
            "/tmp/inv.db",
            "import",
            "jan-aushadhi",
            "pmbi.csv",
            "--replace",
        ])
        .unwrap();

        assert_eq!(cli.store.db, PathBuf::from("/tmp/inv.db"));
        match cli.command {
            Some(Command::Import { collection, csv, replace }) => {
                assert_eq!(collection, Collection::JanAushadhi);
                assert_eq!(csv, PathBuf::from("pmbi.csv"));
                assert!(replace);
            }
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_browse_language() {
        let cli = Cli::try_parse_from(["medsync", "browse", "--language", "kn"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Browse { language: Language::Kannada })
        ));
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let cli = ServerCli::try_parse_from(["medsync-server", "--poll-ms", "0"]).unwrap();
        assert_eq!(Config::from_args(&cli.store).poll_interval, Duration::from_millis(50));
    }
}
