//! CLI module for tenant-restore
//!
//! Provides command-line interface for:
//! - restore: Restore a tenant from a backup archive
//! - plan: Print the phases a restore would run

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{plan, restore, run, run_command};
pub use config::{Config, ObjectStoreKind, ServicesConfig};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
