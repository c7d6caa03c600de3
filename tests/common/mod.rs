//! Shared harness for restore integration tests
//!
//! Builds a `dump.tar.gz` fixture inside a directory mirror, seeds a live
//! deployment in a `MemoryStore`, and provides recording fakes for the
//! service fleet, schema migrator and bootstrap endpoint.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use mongodb::bson::{doc, Document};
use tempfile::TempDir;

use tenant_restore::archive::{
    ArchiveError, ArchiveLocator, ArchiveResult, ArchiveSource, DirectoryArchiveSource,
};
use tenant_restore::lifecycle::{
    BootstrapService, LifecycleError, LifecycleResult, ProcessController, SchemaMigrator,
};
use tenant_restore::objects::MemoryObjectStore;
use tenant_restore::restore::{Collaborators, RestoreOptions, RestorePipeline, RestorePlan};
use tenant_restore::store::{MemoryStore, StoreCall};

pub const ARCHIVE_BUCKET: &str = "acme-backups";
pub const ARCHIVE_KEY: &str = "nightly/dump.tar.gz";
pub const ASSET_BUCKET: &str = "acme-assets";
pub const LIVE_TENANT: &str = "tenant-live";
pub const DUMP_TENANT: &str = "tenant-old";

// =============================================================================
// Archive Fixture
// =============================================================================

/// Concatenated BSON, the on-disk dump format
pub fn bson_bytes(documents: &[Document]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for document in documents {
        document.to_writer(&mut bytes).unwrap();
    }
    bytes
}

/// Contents of a backup archive
pub struct ArchiveSpec {
    pub database: String,
    pub dumps: Vec<(String, Vec<Document>)>,
    pub assets: Vec<(String, Vec<u8>)>,
}

impl ArchiveSpec {
    pub fn new() -> Self {
        Self {
            database: "app".to_string(),
            dumps: Vec::new(),
            assets: Vec::new(),
        }
    }

    pub fn dump(mut self, collection: &str, documents: Vec<Document>) -> Self {
        self.dumps.push((collection.to_string(), documents));
        self
    }

    pub fn asset(mut self, name: &str, body: &[u8]) -> Self {
        self.assets.push((name.to_string(), body.to_vec()));
        self
    }

    /// Write the archive as `<mirror>/<bucket>/<key>`
    pub fn write_to(&self, mirror: &Path, bucket: &str, key: &str) -> PathBuf {
        let path = mirror.join(bucket).join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();

        let file = File::create(&path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

        for (collection, documents) in &self.dumps {
            let entry = format!("dump/{}/{}.bson", self.database, collection);
            append(&mut builder, &entry, &bson_bytes(documents));
        }
        for (name, body) in &self.assets {
            let entry = format!("s3/org::{}/{}", DUMP_TENANT, name);
            append(&mut builder, &entry, body);
        }

        builder.into_inner().unwrap().finish().unwrap();
        path
    }
}

fn append<W: std::io::Write>(builder: &mut tar::Builder<W>, path: &str, bytes: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, bytes).unwrap();
}

/// The archive used by most scenarios: organizations, settings, files and
/// connection dumps plus two asset payloads.
pub fn standard_archive() -> ArchiveSpec {
    ArchiveSpec::new()
        .dump(
            "organizations",
            vec![doc! {
                "_id": DUMP_TENANT,
                "name": "Acme (restored)",
                "orgCoreId": DUMP_TENANT,
                "orgCoreToken": "DUMP-TOKEN",
                "apiKey": "dump-key",
            }],
        )
        .dump(
            "settings",
            vec![
                doc! { "settingKey": "sslDomain", "value": "old.example.com" },
                doc! { "settingKey": "theme", "value": "dark" },
            ],
        )
        .dump(
            "files",
            vec![
                doc! {
                    "_id": 1,
                    "name": "policy.pdf",
                    "key": format!("{}/policy.pdf", DUMP_TENANT),
                    "bucket": "old-bucket",
                },
                doc! {
                    "_id": 2,
                    "name": "terms.pdf",
                    "key": format!("{}/terms.pdf", DUMP_TENANT),
                    "bucket": "old-bucket",
                },
            ],
        )
        .dump(
            "externalaccounts",
            vec![doc! { "provider": "slack", "isValid": true }],
        )
        .dump(
            "users",
            vec![
                doc! { "_id": "u1", "email": "ann@acme.test", "organization": DUMP_TENANT },
                doc! { "_id": "u2", "email": "ops@acme.test" },
            ],
        )
        .asset("policy.pdf", b"%PDF-policy")
        .asset("terms.pdf", b"%PDF-terms")
}

/// The live deployment before a restore
pub fn seed_live(store: &MemoryStore) {
    store.seed(
        "organizations",
        vec![doc! {
            "_id": LIVE_TENANT,
            "name": "Acme",
            "orgCoreId": LIVE_TENANT,
            "orgCoreToken": "T1",
            "apiKey": "live-key",
            "apiSecret": "live-secret",
        }],
    );
    store.seed(
        "settings",
        vec![doc! { "settingKey": "templateUrl", "value": "https://templates.live" }],
    );
    store.seed("jobs", vec![doc! { "name": "nightly-report" }]);
    store.seed(
        "externalaccounts",
        vec![doc! { "provider": "slack", "isValid": true }],
    );
}

pub fn locator() -> ArchiveLocator {
    ArchiveLocator::parse(&format!("s3://{}/{}", ARCHIVE_BUCKET, ARCHIVE_KEY)).unwrap()
}

// =============================================================================
// Recording Fakes
// =============================================================================

/// Service fleet and schema migrator in one, recording every call
#[derive(Default)]
pub struct RecordingServices {
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<Vec<&'static str>>,
    /// Store journal length when the first injected failure fired
    failed_at: Mutex<Option<usize>>,
    store: Option<MemoryStore>,
}

impl RecordingServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the store so failures can snapshot its journal
    pub fn watching(store: &MemoryStore) -> Self {
        Self {
            store: Some(store.clone()),
            ..Self::default()
        }
    }

    /// Make `call` ("stop", "start", "status" or "migrate") fail
    pub fn fail(&self, call: &'static str) {
        self.failing.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn failed_at(&self) -> Option<usize> {
        *self.failed_at.lock().unwrap()
    }

    fn call(&self, name: &'static str) -> bool {
        self.calls.lock().unwrap().push(name);
        let fails = self.failing.lock().unwrap().contains(&name);
        if fails {
            let mut failed_at = self.failed_at.lock().unwrap();
            if failed_at.is_none() {
                *failed_at = Some(self.store.as_ref().map_or(0, |s| s.journal().len()));
            }
        }
        fails
    }
}

#[async_trait]
impl ProcessController for RecordingServices {
    async fn stop_all(&self) -> LifecycleResult<()> {
        if self.call("stop") {
            return Err(LifecycleError::command_failed("pm2 stop all exited with 1"));
        }
        Ok(())
    }

    async fn start_all(&self) -> LifecycleResult<()> {
        if self.call("start") {
            return Err(LifecycleError::command_failed("pm2 start all exited with 1"));
        }
        Ok(())
    }

    async fn status(&self) -> LifecycleResult<String> {
        if self.call("status") {
            return Err(LifecycleError::command_failed("pm2 status exited with 1"));
        }
        Ok("online".to_string())
    }
}

#[async_trait]
impl SchemaMigrator for RecordingServices {
    async fn migrate(&self) -> LifecycleResult<()> {
        if self.call("migrate") {
            return Err(LifecycleError::migration_failed("npm run migrate exited with 1"));
        }
        Ok(())
    }
}

/// Bootstrap endpoint failing until its `succeed_on`-th call
pub struct FlakyBootstrap {
    calls: AtomicU32,
    succeed_on: Option<u32>,
    failed_at: Mutex<Option<usize>>,
    store: Option<MemoryStore>,
}

impl FlakyBootstrap {
    pub fn succeeding_on(attempt: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            succeed_on: Some(attempt),
            failed_at: Mutex::new(None),
            store: None,
        }
    }

    pub fn always_failing(store: &MemoryStore) -> Self {
        Self {
            calls: AtomicU32::new(0),
            succeed_on: None,
            failed_at: Mutex::new(None),
            store: Some(store.clone()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn failed_at(&self) -> Option<usize> {
        *self.failed_at.lock().unwrap()
    }
}

#[async_trait]
impl BootstrapService for FlakyBootstrap {
    async fn bootstrap(&self) -> LifecycleResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.succeed_on {
            Some(n) if call >= n => Ok(()),
            _ => {
                if let Some(ref store) = self.store {
                    *self.failed_at.lock().unwrap() = Some(store.journal().len());
                }
                Err(LifecycleError::bootstrap_failed(format!(
                    "endpoint returned 503 on call {}",
                    call
                )))
            }
        }
    }
}

/// Archive source that can never deliver
pub struct UnreachableArchives {
    failed_at: Mutex<Option<usize>>,
    store: MemoryStore,
}

impl UnreachableArchives {
    pub fn new(store: &MemoryStore) -> Self {
        Self {
            failed_at: Mutex::new(None),
            store: store.clone(),
        }
    }

    pub fn failed_at(&self) -> Option<usize> {
        *self.failed_at.lock().unwrap()
    }
}

#[async_trait]
impl ArchiveSource for UnreachableArchives {
    async fn fetch(&self, locator: &ArchiveLocator, _dest: &Path) -> ArchiveResult<u64> {
        *self.failed_at.lock().unwrap() = Some(self.store.journal().len());
        Err(ArchiveError::download_failed(format!(
            "{}: connection refused",
            locator
        )))
    }
}

// =============================================================================
// Pipeline Assembly
// =============================================================================

/// Everything one scenario needs, kept alive for the test's duration
pub struct Harness {
    pub temp: TempDir,
    pub store: MemoryStore,
    pub objects: MemoryObjectStore,
    pub services: Arc<RecordingServices>,
    pub options: RestoreOptions,
}

impl Harness {
    /// Standard archive in the mirror, live deployment seeded
    pub fn new() -> Self {
        Self::with_archive(standard_archive())
    }

    pub fn with_archive(archive: ArchiveSpec) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        archive.write_to(&temp.path().join("mirror"), ARCHIVE_BUCKET, ARCHIVE_KEY);

        let store = MemoryStore::new();
        seed_live(&store);

        let mut options = RestoreOptions::with_bucket(ASSET_BUCKET);
        options.work_dir = temp.path().join("work");
        options.bootstrap.delay_secs = 0;

        let services = Arc::new(RecordingServices::watching(&store));
        Self {
            temp,
            store,
            objects: MemoryObjectStore::new(),
            services,
            options,
        }
    }

    pub fn mirror(&self) -> PathBuf {
        self.temp.path().join("mirror")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.options.work_dir.clone()
    }

    /// Collaborators reading the archive from the mirror, no bootstrap
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: Arc::new(self.store.clone()),
            objects: Arc::new(self.objects.clone()),
            archives: Arc::new(DirectoryArchiveSource::new(self.mirror())),
            processes: self.services.clone(),
            migrator: self.services.clone(),
            bootstrap: None,
        }
    }

    pub fn pipeline(&self, local: bool) -> RestorePipeline {
        self.pipeline_with(local, self.collaborators())
    }

    pub fn pipeline_with(&self, local: bool, collaborators: Collaborators) -> RestorePipeline {
        RestorePipeline::new(self.options.clone(), RestorePlan::new(local), collaborators)
    }

    pub fn journal(&self) -> Vec<StoreCall> {
        self.store.journal()
    }

    /// Rotated collections currently present
    pub fn rotated(&self) -> Vec<String> {
        self.store
            .collection_names()
            .into_iter()
            .filter(|name| name.starts_with(&self.options.rotation_prefix))
            .collect()
    }
}
