//! Phase plan
//!
//! The pipeline is an explicit ordered list of phases. `Finalize` is always
//! last, so a driver that stops at the first failure can never reach it after
//! one.

use std::fmt;

/// One step of a restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Download and extract the archive
    FetchArchive,
    /// Read identity fields from the pre-restore organization record
    CaptureIdentity,
    StopServices,
    /// Drop rotated collections left over from an earlier run
    ClearRotated,
    Rotate,
    RestoreCollections,
    MergeIdentity,
    RelocateAssets,
    SanitizeSettings,
    MigrateSchema,
    StartServices,
    Bootstrap,
    /// Remove work files and drop rotated collections
    Finalize,
}

impl Phase {
    /// Every phase in execution order
    pub const ALL: [Phase; 13] = [
        Phase::FetchArchive,
        Phase::CaptureIdentity,
        Phase::StopServices,
        Phase::ClearRotated,
        Phase::Rotate,
        Phase::RestoreCollections,
        Phase::MergeIdentity,
        Phase::RelocateAssets,
        Phase::SanitizeSettings,
        Phase::MigrateSchema,
        Phase::StartServices,
        Phase::Bootstrap,
        Phase::Finalize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::FetchArchive => "FETCH_ARCHIVE",
            Phase::CaptureIdentity => "CAPTURE_IDENTITY",
            Phase::StopServices => "STOP_SERVICES",
            Phase::ClearRotated => "CLEAR_ROTATED",
            Phase::Rotate => "ROTATE",
            Phase::RestoreCollections => "RESTORE_COLLECTIONS",
            Phase::MergeIdentity => "MERGE_IDENTITY",
            Phase::RelocateAssets => "RELOCATE_ASSETS",
            Phase::SanitizeSettings => "SANITIZE_SETTINGS",
            Phase::MigrateSchema => "MIGRATE_SCHEMA",
            Phase::StartServices => "START_SERVICES",
            Phase::Bootstrap => "BOOTSTRAP",
            Phase::Finalize => "FINALIZE",
        }
    }

    /// Phases that touch the service fleet and are skipped in local mode
    pub fn is_service_phase(&self) -> bool {
        matches!(
            self,
            Phase::StopServices | Phase::MigrateSchema | Phase::StartServices
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered phases for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    local: bool,
    phases: Vec<Phase>,
}

impl RestorePlan {
    /// Full plan, minus the service phases in local mode
    pub fn new(local: bool) -> Self {
        let phases = Phase::ALL
            .iter()
            .copied()
            .filter(|phase| !(local && phase.is_service_phase()))
            .collect();
        Self { local, phases }
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.phases.iter().map(Phase::name).collect()
    }
}
