//! Restore orchestrator
//!
//! Drives one tenant restore through an explicit ordered list of phases:
//!
//! ```text
//! FETCH_ARCHIVE ─► CAPTURE_IDENTITY ─► [STOP_SERVICES] ─► CLEAR_ROTATED ─► ROTATE
//!   ─► RESTORE_COLLECTIONS ─► MERGE_IDENTITY ─► RELOCATE_ASSETS ─► SANITIZE_SETTINGS
//!   ─► [MIGRATE_SCHEMA] ─► [START_SERVICES] ─► BOOTSTRAP ─► FINALIZE
//! ```
//!
//! Bracketed phases are dropped in local mode. The driver stops at the first
//! failing phase and never reaches `FINALIZE` after one: rotated collections
//! are the only rollback path until then.
//!
//! Each phase that touches the document store opens its own session and
//! closes it before returning, whether or not the phase succeeded.

mod assets;
mod context;
mod errors;
mod finalizer;
mod identity;
mod options;
mod plan;
mod restorer;
mod rotator;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::archive::{
    create_extraction_dir, extract_archive, ArchiveLayout, ArchiveLocator, ArchiveResult,
    ArchiveSource,
};
use crate::lifecycle::{
    retry_fixed, BootstrapService, LifecycleMachine, LifecycleState, ProcessController,
    SchemaMigrator,
};
use crate::objects::ObjectStore;
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::store::{DocumentSession, DocumentStore};

pub use assets::{rewrite_references, upload_assets, UploadSummary};
pub use context::{RestoreReport, RunContext};
pub use errors::{ErrorClass, RestoreError, RestoreErrorCode, RestoreResult, Severity};
pub use finalizer::finalize;
pub use identity::{
    capture, find_organization, merge_identity, reparent, tenant_id, CapturedIdentity,
};
pub use options::{BootstrapOptions, IdentityField, RestoreOptions, SettingsPolicy};
pub use plan::{Phase, RestorePlan};
pub use restorer::{clear_rotated, drop_if_exists, restore};
pub use rotator::rotate;
pub use settings::{sanitize, SanitizeSummary};

/// External systems a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub archives: Arc<dyn ArchiveSource>,
    pub processes: Arc<dyn ProcessController>,
    pub migrator: Arc<dyn SchemaMigrator>,
    /// No bootstrap call is made when absent
    pub bootstrap: Option<Arc<dyn BootstrapService>>,
}

/// One restore run
pub struct RestorePipeline {
    options: RestoreOptions,
    plan: RestorePlan,
    collaborators: Collaborators,
    lifecycle: LifecycleMachine,
}

impl RestorePipeline {
    pub fn new(options: RestoreOptions, plan: RestorePlan, collaborators: Collaborators) -> Self {
        Self {
            options,
            plan,
            collaborators,
            lifecycle: LifecycleMachine::new(),
        }
    }

    pub fn plan(&self) -> &RestorePlan {
        &self.plan
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    pub fn lifecycle(&self) -> &LifecycleMachine {
        &self.lifecycle
    }

    /// Run every phase of the plan in order.
    ///
    /// On failure the lifecycle moves to `Failed` and the error names the
    /// phase it surfaced in.
    pub async fn run(&mut self, locator: &ArchiveLocator) -> RestoreResult<RestoreReport> {
        let archive = locator.to_string();
        let mode = if self.plan.is_local() { "local" } else { "managed" };
        log_event_with_fields(
            Event::RestoreStart,
            &[("archive", archive.as_str()), ("mode", mode)],
        );

        let mut ctx = RunContext::new(&archive, self.plan.is_local());
        let phases = self.plan.phases().to_vec();

        for phase in phases {
            let scope = ObservationScope::new(phase.name());
            let outcome = match self.enter(phase) {
                Ok(()) => self.execute(phase, locator, &mut ctx).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => {
                    scope.complete();
                    ctx.report.phases_completed.push(phase.name().to_string());
                }
                Err(err) => {
                    let err = err.in_phase(phase);
                    let reason = err.to_string();
                    scope.fail(&reason);
                    self.lifecycle.fail();
                    log_event_with_fields(
                        Event::RestoreFailed,
                        &[
                            ("class", err.class().as_str()),
                            ("phase", phase.name()),
                            ("reason", reason.as_str()),
                        ],
                    );
                    return Err(err);
                }
            }
        }

        self.lifecycle.transition(LifecycleState::Done)?;
        ctx.report.finished_at = Some(Utc::now());
        let run_id = ctx.report.run_id.to_string();
        log_event_with_fields(
            Event::RestoreComplete,
            &[("archive", archive.as_str()), ("run_id", run_id.as_str())],
        );
        Ok(ctx.report)
    }

    /// Lifecycle transition taken on entering `phase`
    fn enter(&mut self, phase: Phase) -> RestoreResult<()> {
        let lifecycle = &mut self.lifecycle;
        match phase {
            Phase::StopServices => lifecycle.transition(LifecycleState::Stopped)?,
            Phase::ClearRotated => lifecycle.transition(LifecycleState::Mutating)?,
            Phase::MigrateSchema => lifecycle.transition(LifecycleState::MigratingSchema)?,
            Phase::StartServices => lifecycle.transition(LifecycleState::Running)?,
            Phase::Bootstrap => {
                // Local runs never restart services; the data is simply live.
                lifecycle.ensure(LifecycleState::Running)?;
                lifecycle.transition(LifecycleState::Bootstrapping)?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn execute(
        &self,
        phase: Phase,
        locator: &ArchiveLocator,
        ctx: &mut RunContext,
    ) -> RestoreResult<()> {
        let options = &self.options;
        match phase {
            Phase::FetchArchive => self.fetch_archive(locator, ctx).await,

            Phase::CaptureIdentity => {
                let session = self.open_session().await?;
                let outcome =
                    identity::find_organization(session.as_ref(), &options.organizations_collection)
                        .await;
                let organization = release(session, outcome).await?;
                let captured = identity::capture(
                    &organization,
                    &options.identity_fields,
                    &options.tenant_id_field,
                )?;
                ctx.report.tenant_id = Some(captured.tenant_id.clone());
                ctx.tenant_id = Some(captured.tenant_id.clone());
                ctx.captured = Some(captured);
                Ok(())
            }

            Phase::StopServices => {
                self.collaborators.processes.stop_all().await?;
                log_event_with_fields(Event::ServicesStopped, &[]);
                Ok(())
            }

            Phase::ClearRotated => {
                let session = self.open_session().await?;
                let outcome =
                    restorer::clear_rotated(session.as_ref(), &options.rotation_prefix, &ctx.dumps)
                        .await;
                ctx.report.cleared = release(session, outcome).await?;
                Ok(())
            }

            Phase::Rotate => {
                let session = self.open_session().await?;
                let outcome = rotator::rotate(
                    session.as_ref(),
                    &options.rotation_prefix,
                    &options.rotation_exclude,
                )
                .await;
                ctx.report.rotated = release(session, outcome).await?;
                Ok(())
            }

            Phase::RestoreCollections => {
                let session = self.open_session().await?;
                let outcome = restorer::restore(session.as_ref(), &ctx.dumps).await;
                ctx.report.restored = release(session, outcome).await?;
                Ok(())
            }

            Phase::MergeIdentity => {
                let captured = ctx.captured()?.clone();
                let session = self.open_session().await?;
                let outcome: RestoreResult<_> = async {
                    let modified = identity::merge_identity(
                        session.as_ref(),
                        &options.organizations_collection,
                        &captured,
                    )
                    .await?;
                    let reparented = identity::reparent(
                        session.as_ref(),
                        &options.organizations_collection,
                        &options.reparent,
                        &captured,
                    )
                    .await?;
                    Ok((modified, reparented))
                }
                .await;
                let (modified, reparented) = release(session, outcome).await?;
                ctx.report.identity_modified = modified;
                ctx.report.reparented = reparented;
                Ok(())
            }

            Phase::RelocateAssets => self.relocate_assets(ctx).await,

            Phase::SanitizeSettings => {
                let session = self.open_session().await?;
                let outcome =
                    settings::sanitize(session.as_ref(), &options.settings, &options.rotation_prefix)
                        .await;
                let summary = release(session, outcome).await?;
                ctx.report.settings_carried = summary.carried;
                ctx.report.settings_removed = summary.removed;
                ctx.report.connections_invalidated = summary.invalidated;
                Ok(())
            }

            Phase::MigrateSchema => {
                self.collaborators.migrator.migrate().await?;
                log_event_with_fields(Event::SchemaMigrated, &[]);
                Ok(())
            }

            Phase::StartServices => {
                let processes = &self.collaborators.processes;
                processes.start_all().await?;
                log_event_with_fields(Event::ServicesStarted, &[]);
                match processes.status().await {
                    Ok(status) => {
                        log_event_with_fields(Event::ServiceStatus, &[("status", status.as_str())])
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        log_event_with_fields(Event::ServiceStatus, &[("error", reason.as_str())])
                    }
                }
                Ok(())
            }

            Phase::Bootstrap => self.bootstrap(ctx).await,

            Phase::Finalize => {
                let session = self.open_session().await?;
                let outcome = finalizer::finalize(
                    session.as_ref(),
                    &options.rotation_prefix,
                    &ctx.work_paths(),
                )
                .await;
                ctx.report.dropped = release(session, outcome).await?;
                Ok(())
            }
        }
    }

    async fn fetch_archive(&self, locator: &ArchiveLocator, ctx: &mut RunContext) -> RestoreResult<()> {
        let work_dir = self.options.work_dir.clone();
        tokio::fs::create_dir_all(&work_dir).await.map_err(|e| {
            RestoreError::io_error(format!("Failed to create {}: {}", work_dir.display(), e))
        })?;

        let archive_file = work_dir.join(locator.file_name());
        ctx.archive_file = Some(archive_file.clone());
        let bytes = self
            .collaborators
            .archives
            .fetch(locator, &archive_file)
            .await?;
        let bytes = bytes.to_string();
        let shown = archive_file.display().to_string();
        log_event_with_fields(
            Event::ArchiveDownloaded,
            &[("bytes", bytes.as_str()), ("path", shown.as_str())],
        );

        let extracted = tokio::task::spawn_blocking(move || -> ArchiveResult<PathBuf> {
            let dest = create_extraction_dir(&work_dir)?;
            extract_archive(&archive_file, &dest)?;
            Ok(dest)
        })
        .await
        .map_err(|e| RestoreError::internal(format!("extraction task failed: {}", e)))??;
        ctx.extracted_dir = Some(extracted.clone());

        let layout = ArchiveLayout::open(&extracted)?;
        ctx.dumps = layout.dump_files()?;
        let dumps = ctx.dumps.len().to_string();
        let shown = layout.dump_dir().display().to_string();
        log_event_with_fields(
            Event::ArchiveExtracted,
            &[("dump_dir", shown.as_str()), ("dumps", dumps.as_str())],
        );
        ctx.layout = Some(layout);
        Ok(())
    }

    async fn relocate_assets(&self, ctx: &mut RunContext) -> RestoreResult<()> {
        let options = &self.options;
        let tenant = ctx.tenant_id()?.to_string();

        let session = self.open_session().await?;
        let outcome = assets::rewrite_references(
            session.as_ref(),
            &options.files_collection,
            &tenant,
            &options.bucket,
        )
        .await;
        ctx.report.references_rewritten = release(session, outcome).await?;

        let files = ctx
            .layout()?
            .asset_files(&options.assets_dir, &options.org_dir_marker)?;
        if files.is_empty() {
            log_event_with_fields(Event::AssetsAbsent, &[("dir", options.assets_dir.as_str())]);
        }

        let summary = assets::upload_assets(
            self.collaborators.objects.as_ref(),
            &files,
            &tenant,
            &options.bucket,
            options.upload_concurrency,
        )
        .await;
        ctx.report.uploaded_keys = summary.uploaded;
        ctx.report.upload_failures = summary.failed;
        Ok(())
    }

    async fn bootstrap(&self, ctx: &mut RunContext) -> RestoreResult<()> {
        let Some(service) = self.collaborators.bootstrap.clone() else {
            log_event_with_fields(
                Event::PhaseSkipped,
                &[("phase", Phase::Bootstrap.name()), ("reason", "no bootstrap endpoint")],
            );
            return Ok(());
        };

        let outcome = retry_fixed(self.options.bootstrap.retry_policy(), |attempt| {
            let attempt = attempt.to_string();
            log_event_with_fields(Event::BootstrapAttempt, &[("attempt", attempt.as_str())]);
            let service = Arc::clone(&service);
            async move { service.bootstrap().await }
        })
        .await;

        ctx.report.bootstrap_attempts = outcome.attempts;
        match outcome.result {
            Ok(()) => {
                let attempts = outcome.attempts.to_string();
                log_event_with_fields(Event::BootstrapComplete, &[("attempts", attempts.as_str())]);
                Ok(())
            }
            Err(err) => Err(RestoreError::bootstrap(
                format!("Bootstrap failed after {} attempts", outcome.attempts),
                err,
            )),
        }
    }

    async fn open_session(&self) -> RestoreResult<Box<dyn DocumentSession>> {
        let session = self.collaborators.store.connect().await.map_err(|e| {
            RestoreError::mutation("Failed to open document store session", e)
        })?;
        log_event_with_fields(Event::SessionOpened, &[]);
        Ok(session)
    }
}

/// Close `session`, then hand back the phase outcome unchanged. A failed close
/// is logged and never masks the outcome.
async fn release<T>(
    session: Box<dyn DocumentSession>,
    outcome: RestoreResult<T>,
) -> RestoreResult<T> {
    match session.close().await {
        Ok(()) => log_event_with_fields(Event::SessionClosed, &[]),
        Err(err) => {
            let reason = err.to_string();
            log_event_with_fields(Event::SessionCloseFailed, &[("reason", reason.as_str())]);
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::DirectoryArchiveSource;
    use crate::lifecycle::{LifecycleError, LifecycleResult};
    use crate::objects::MemoryObjectStore;
    use crate::store::{MemoryStore, StoreOp};
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use mongodb::bson::{doc, Document};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Services {
        calls: Mutex<Vec<&'static str>>,
        fail_migration: bool,
    }

    #[async_trait]
    impl ProcessController for Services {
        async fn stop_all(&self) -> LifecycleResult<()> {
            self.calls.lock().unwrap().push("stop");
            Ok(())
        }
        async fn start_all(&self) -> LifecycleResult<()> {
            self.calls.lock().unwrap().push("start");
            Ok(())
        }
        async fn status(&self) -> LifecycleResult<String> {
            Ok("online".into())
        }
    }

    #[async_trait]
    impl SchemaMigrator for Services {
        async fn migrate(&self) -> LifecycleResult<()> {
            self.calls.lock().unwrap().push("migrate");
            if self.fail_migration {
                Err(LifecycleError::migration_failed("exit 1"))
            } else {
                Ok(())
            }
        }
    }

    fn bson_bytes(documents: &[Document]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for document in documents {
            document.to_writer(&mut bytes).unwrap();
        }
        bytes
    }

    fn write_archive(mirror: &std::path::Path) {
        let dir = mirror.join("acme-backups");
        std::fs::create_dir_all(&dir).unwrap();
        let file = std::fs::File::create(dir.join("dump.tar.gz")).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let entries = [
            (
                "dump/app/organizations.bson",
                bson_bytes(&[doc! { "_id": "t2", "name": "dump", "orgCoreToken": "DUMP" }]),
            ),
            ("dump/app/settings.bson", bson_bytes(&[doc! { "settingKey": "sslDomain" }])),
        ];
        for (path, bytes) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, bytes.as_slice()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn pipeline(
        temp: &TempDir,
        store: &MemoryStore,
        services: Arc<Services>,
        local: bool,
    ) -> RestorePipeline {
        write_archive(&temp.path().join("mirror"));
        let mut options = RestoreOptions::with_bucket("acme-assets");
        options.work_dir = temp.path().join("work");

        let collaborators = Collaborators {
            store: Arc::new(store.clone()),
            objects: Arc::new(MemoryObjectStore::new()),
            archives: Arc::new(DirectoryArchiveSource::new(temp.path().join("mirror"))),
            processes: services.clone(),
            migrator: services,
            bootstrap: None,
        };
        RestorePipeline::new(options, RestorePlan::new(local), collaborators)
    }

    fn locator() -> ArchiveLocator {
        ArchiveLocator::parse("s3://acme-backups/dump.tar.gz").unwrap()
    }

    #[tokio::test]
    async fn test_local_run_completes() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.seed("organizations", vec![doc! { "_id": "t1", "orgCoreToken": "T1" }]);
        let services = Arc::new(Services::default());

        let mut pipeline = pipeline(&temp, &store, services.clone(), true);
        let report = pipeline.run(&locator()).await.unwrap();

        assert_eq!(pipeline.lifecycle().state(), LifecycleState::Done);
        assert!(services.calls.lock().unwrap().is_empty());
        assert_eq!(report.tenant_id.as_deref(), Some("t1"));
        assert_eq!(report.phases_completed.len(), pipeline.plan().phases().len());
        assert_eq!(store.collection_names(), vec!["organizations", "settings"]);
        assert_eq!(store.open_sessions(), 0);
        let org = &store.documents("organizations").unwrap()[0];
        assert_eq!(org.get_str("orgCoreToken").unwrap(), "T1");
        assert_eq!(org.get_str("name").unwrap(), "dump");
    }

    #[tokio::test]
    async fn test_migration_failure_stops_before_finalize() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.seed("organizations", vec![doc! { "_id": "t2" }]);
        let services = Arc::new(Services {
            fail_migration: true,
            ..Services::default()
        });

        let mut pipeline = pipeline(&temp, &store, services.clone(), false);
        let err = pipeline.run(&locator()).await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::MigrateSchema));
        assert_eq!(pipeline.lifecycle().state(), LifecycleState::Failed);
        assert_eq!(*services.calls.lock().unwrap(), vec!["stop", "migrate"]);
        assert!(store.collection_names().contains(&"back_organizations".to_string()));
        assert!(temp.path().join("work/dump.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_missing_organization_fails_before_mutation() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.seed("users", vec![doc! { "name": "a" }]);

        let mut pipeline = pipeline(&temp, &store, Arc::new(Services::default()), true);
        let err = pipeline.run(&locator()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Precondition);
        assert_eq!(err.phase(), Some(Phase::CaptureIdentity));
        assert_eq!(store.collection_names(), vec!["users"]);
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_released_when_phase_fails() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store.seed("organizations", vec![doc! { "_id": "t2" }]);
        store.fail_on(StoreOp::Rename, "organizations");

        let mut pipeline = pipeline(&temp, &store, Arc::new(Services::default()), true);
        let err = pipeline.run(&locator()).await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Rotate));
        assert_eq!(err.class(), ErrorClass::Mutation);
        assert_eq!(store.open_sessions(), 0);
        let closes = store.journal().iter().filter(|c| c.op == StoreOp::Close).count();
        let connects = store.journal().iter().filter(|c| c.op == StoreOp::Connect).count();
        assert_eq!(closes, connects);
    }
}
