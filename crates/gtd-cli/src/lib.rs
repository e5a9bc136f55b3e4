//! GTD tracker CLI library

pub mod output;
pub mod project;
pub mod step;
pub mod tags;
pub mod watch;

use anyhow::{Context, Result};
use gtd_core::{Config, Tracker};
use std::path::PathBuf;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gtd")]
#[command(about = "Track projects, steps and step timers")]
#[command(version, author, long_about = None)]
pub struct Cli {
    /// Database file (overrides the config file and GTD_HOME)
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Work in the demo partition
    #[arg(long = "demo", global = true)]
    pub demo: bool,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn", global = true)]
    pub log_level: tracing::Level,

    /// Print records as JSON
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Project management commands
    Project {
        #[command(subcommand)]
        subcommand: project::ProjectCommands,
    },
    /// Step management and timer commands
    Step {
        #[command(subcommand)]
        subcommand: step::StepCommands,
    },
    /// Category registry commands
    Category {
        #[command(subcommand)]
        subcommand: tags::TagCommands,
    },
    /// Status registry commands
    Status {
        #[command(subcommand)]
        subcommand: tags::TagCommands,
    },
    /// Follow the live step durations of a project
    Watch(watch::WatchArgs),
}

impl Cli {
    /// Configuration from `--config` (if any) with command-line overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(db) = &self.db {
            config.database_path = Some(db.clone());
        }
        if self.demo {
            config.demo_mode = true;
        }
        Ok(config)
    }

    pub fn open_tracker(&self) -> Result<Tracker> {
        let config = self.load_config()?;
        Tracker::open(&config).context("Failed to open tracker database")
    }
}
