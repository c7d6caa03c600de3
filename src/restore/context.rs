//! Run context threaded from phase to phase, and the report built from it

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::archive::{ArchiveLayout, DumpFile};

use super::errors::{RestoreError, RestoreResult};
use super::identity::CapturedIdentity;

/// Summary of a restore run
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub run_id: Uuid,
    pub archive: String,
    pub local: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub phases_completed: Vec<String>,
    /// Rotated collections left by an earlier run and dropped before rotating
    pub cleared: Vec<String>,
    /// Live collections renamed to their rotated form
    pub rotated: Vec<String>,
    /// Documents loaded per restored collection
    pub restored: BTreeMap<String, u64>,
    /// Documents modified per collection by the identity merge
    pub identity_modified: BTreeMap<String, u64>,
    /// Documents re-pointed at the live organization, per collection
    pub reparented: BTreeMap<String, u64>,
    pub references_rewritten: u64,
    pub uploaded_keys: Vec<String>,
    pub upload_failures: Vec<String>,
    pub settings_carried: Vec<String>,
    pub settings_removed: u64,
    pub connections_invalidated: u64,
    pub bootstrap_attempts: u32,
    /// Rotated collections dropped by the finalizer
    pub dropped: Vec<String>,
}

impl RestoreReport {
    fn new(archive: &str, local: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            archive: archive.to_string(),
            local,
            started_at: Utc::now(),
            finished_at: None,
            tenant_id: None,
            phases_completed: Vec::new(),
            cleared: Vec::new(),
            rotated: Vec::new(),
            restored: BTreeMap::new(),
            identity_modified: BTreeMap::new(),
            reparented: BTreeMap::new(),
            references_rewritten: 0,
            uploaded_keys: Vec::new(),
            upload_failures: Vec::new(),
            settings_carried: Vec::new(),
            settings_removed: 0,
            connections_invalidated: 0,
            bootstrap_attempts: 0,
            dropped: Vec::new(),
        }
    }
}

/// State carried between phases of one run
#[derive(Debug)]
pub struct RunContext {
    /// Downloaded archive file
    pub archive_file: Option<PathBuf>,
    /// Extraction directory
    pub extracted_dir: Option<PathBuf>,
    pub layout: Option<ArchiveLayout>,
    pub dumps: Vec<DumpFile>,
    pub captured: Option<CapturedIdentity>,
    pub tenant_id: Option<String>,
    pub report: RestoreReport,
}

impl RunContext {
    pub fn new(archive: &str, local: bool) -> Self {
        Self {
            archive_file: None,
            extracted_dir: None,
            layout: None,
            dumps: Vec::new(),
            captured: None,
            tenant_id: None,
            report: RestoreReport::new(archive, local),
        }
    }

    pub fn layout(&self) -> RestoreResult<&ArchiveLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| RestoreError::internal("archive layout read before fetch"))
    }

    pub fn captured(&self) -> RestoreResult<&CapturedIdentity> {
        self.captured
            .as_ref()
            .ok_or_else(|| RestoreError::internal("identity merged before capture"))
    }

    pub fn tenant_id(&self) -> RestoreResult<&str> {
        self.tenant_id
            .as_deref()
            .ok_or_else(|| RestoreError::internal("tenant id read before identity capture"))
    }

    /// Work files the finalizer removes
    pub fn work_paths(&self) -> Vec<PathBuf> {
        self.archive_file
            .iter()
            .chain(self.extracted_dir.iter())
            .cloned()
            .collect()
    }
}
