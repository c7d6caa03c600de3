//! CLI command implementations
//!
//! `restore` loads the configuration, builds the real collaborators and runs
//! the pipeline on a tokio runtime. `plan` only prints the phase list.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::archive::{ArchiveLocator, ArchiveSource, DirectoryArchiveSource, S3ArchiveSource};
use crate::lifecycle::{
    BootstrapService, CommandProcessController, CommandSchemaMigrator, HttpBootstrap,
};
use crate::objects::{LocalObjectStore, ObjectStore, S3ObjectStore};
use crate::observability::{log_event_with_fields, Event};
use crate::restore::{Collaborators, RestorePipeline, RestorePlan, RestoreReport};
use crate::store::MongoStore;

use super::args::Command;
use super::config::{Config, ObjectStoreKind};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments, dispatches, and writes the error response on failure.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let result = run_command(cli.command);
    if let Err(ref e) = result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Restore { config, url, local } => restore(&config, &url, local),
        Command::Plan { local } => plan(local),
    }
}

/// Print the ordered phases of a run
pub fn plan(local: bool) -> CliResult<()> {
    let plan = RestorePlan::new(local);
    write_response(json!({
        "local": plan.is_local(),
        "phases": plan.names(),
    }))
}

/// Restore the archive at `url` into the configured deployment
pub fn restore(config_path: &Path, url: &str, local: bool) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let config_shown = config_path.display().to_string();
    log_event_with_fields(Event::ConfigLoaded, &[("path", config_shown.as_str())]);

    // Malformed URLs are rejected before anything is touched.
    let locator = ArchiveLocator::parse(url).map_err(|e| CliError::invalid_url(e.to_string()))?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;

    let report = runtime.block_on(async {
        let collaborators = build_collaborators(&config, &locator).await?;
        let mut pipeline =
            RestorePipeline::new(config.restore.clone(), RestorePlan::new(local), collaborators);
        pipeline.run(&locator).await.map_err(CliError::from)
    })?;

    write_report(&report)
}

fn write_report(report: &RestoreReport) -> CliResult<()> {
    write_response(serde_json::to_value(report)?)
}

async fn build_collaborators(
    config: &Config,
    locator: &ArchiveLocator,
) -> CliResult<Collaborators> {
    let objects: Arc<dyn ObjectStore>;
    let archives: Arc<dyn ArchiveSource>;
    match config.object_store {
        ObjectStoreKind::S3 => {
            let timeout = config.upload_timeout();
            objects = Arc::new(S3ObjectStore::from_env(config.region.as_deref(), timeout).await);
            // The archive bucket may live in another region than the asset bucket.
            let region = locator.region.as_deref().or(config.region.as_deref());
            archives = Arc::new(S3ArchiveSource::new(
                S3ObjectStore::from_env(region, timeout).await,
            ));
        }
        ObjectStoreKind::Local => {
            let root = config
                .local_root
                .clone()
                .ok_or_else(|| CliError::config_error("local_root is not set"))?;
            objects = Arc::new(LocalObjectStore::new(root.clone()));
            archives = Arc::new(DirectoryArchiveSource::new(root));
        }
    }

    let bootstrap = match config.restore.bootstrap.url {
        Some(ref url) => {
            let service = HttpBootstrap::new(url.clone(), config.restore.bootstrap.timeout())
                .map_err(|e| CliError::config_error(e.to_string()))?;
            Some(Arc::new(service) as Arc<dyn BootstrapService>)
        }
        None => None,
    };

    let services = &config.services;
    Ok(Collaborators {
        store: Arc::new(MongoStore::new(&config.mongodb_uri, &config.database)),
        objects,
        archives,
        processes: Arc::new(CommandProcessController {
            stop: services.stop.clone(),
            start: services.start.clone(),
            status: services.status.clone(),
        }),
        migrator: Arc::new(CommandSchemaMigrator {
            command: services.migrate.clone(),
        }),
        bootstrap,
    })
}
