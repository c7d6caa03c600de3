//! tenant-restore CLI entry point
//!
//! Parses arguments, dispatches to the CLI module and exits non-zero on any
//! failure. All logic lives in `cli`.

use tenant_restore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
