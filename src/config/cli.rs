use clap::Parser;
use std::path::PathBuf;

use juicer_core::config::WatcherSettings;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Celebrate issue status transitions")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seed for effect selection and particle jitter (reproducible runs)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Path to a TOML demo scenario
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply CLI overrides on top of loaded settings
    pub fn merge_into(&self, settings: &mut WatcherSettings) {
        if self.debug {
            settings.debug = true;
        }
    }
}
