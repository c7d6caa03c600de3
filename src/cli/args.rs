//! CLI argument definitions using clap
//!
//! Commands:
//! - tenant-restore restore --url <archive-url> [--config <path>] [--local]
//! - tenant-restore plan [--local]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tenant-restore - restore one tenant from a backup archive
#[derive(Parser, Debug)]
#[command(name = "tenant-restore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Restore the archive into the live deployment
    Restore {
        /// Path to configuration file
        #[arg(long, default_value = "./tenant-restore.json")]
        config: PathBuf,

        /// Archive URL: s3://<name>-backups/<path>.tar.gz or its https form
        #[arg(long)]
        url: String,

        /// Skip service stop/start and schema migration
        #[arg(long)]
        local: bool,
    },

    /// Print the phases a restore would run, touching nothing
    Plan {
        /// Plan a local run
        #[arg(long)]
        local: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
