//! Observable events emitted during a restore run.
//!
//! Events are explicit and typed. Phase begin/complete lines come from
//! `ObservationScope`; everything else goes through this enum.

use std::fmt;

/// Observable events in a restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Run
    ConfigLoaded,
    RestoreStart,
    RestoreComplete,
    RestoreFailed,
    PhaseSkipped,

    // Archive
    ArchiveDownloaded,
    ArchiveExtracted,
    AssetsAbsent,

    // Document store
    SessionOpened,
    SessionClosed,
    SessionCloseFailed,
    CollectionRotated,
    RotatedCollectionDropped,
    NamespaceAbsent,
    CollectionRestored,

    // Identity
    IdentityCaptured,
    IdentityFieldMissing,
    IdentityMerged,
    OrganizationReparented,

    // Assets
    AssetReferenceRewritten,
    AssetUploaded,
    AssetUploadFailed,

    // Settings
    SettingCarriedForward,
    SettingNotCarried,
    SettingRemoved,
    ConnectionsInvalidated,

    // Lifecycle
    LifecycleTransition,
    ServicesStopped,
    ServicesStarted,
    ServiceStatus,
    SchemaMigrated,
    BootstrapAttempt,
    BootstrapRetry,
    BootstrapComplete,

    // Finalize
    WorkDirRemoved,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::RestoreStart => "RESTORE_BEGIN",
            Event::RestoreComplete => "RESTORE_COMPLETE",
            Event::RestoreFailed => "RESTORE_FAILED",
            Event::PhaseSkipped => "PHASE_SKIPPED",

            Event::ArchiveDownloaded => "ARCHIVE_DOWNLOADED",
            Event::ArchiveExtracted => "ARCHIVE_EXTRACTED",
            Event::AssetsAbsent => "ASSETS_ABSENT",

            Event::SessionOpened => "SESSION_OPENED",
            Event::SessionClosed => "SESSION_CLOSED",
            Event::SessionCloseFailed => "SESSION_CLOSE_FAILED",
            Event::CollectionRotated => "COLLECTION_ROTATED",
            Event::RotatedCollectionDropped => "ROTATED_COLLECTION_DROPPED",
            Event::NamespaceAbsent => "NAMESPACE_ABSENT",
            Event::CollectionRestored => "COLLECTION_RESTORED",

            Event::IdentityCaptured => "IDENTITY_CAPTURED",
            Event::IdentityFieldMissing => "IDENTITY_FIELD_MISSING",
            Event::IdentityMerged => "IDENTITY_MERGED",
            Event::OrganizationReparented => "ORGANIZATION_REPARENTED",

            Event::AssetReferenceRewritten => "ASSET_REFERENCE_REWRITTEN",
            Event::AssetUploaded => "ASSET_UPLOADED",
            Event::AssetUploadFailed => "ASSET_UPLOAD_FAILED",

            Event::SettingCarriedForward => "SETTING_CARRIED_FORWARD",
            Event::SettingNotCarried => "SETTING_NOT_CARRIED",
            Event::SettingRemoved => "SETTING_REMOVED",
            Event::ConnectionsInvalidated => "CONNECTIONS_INVALIDATED",

            Event::LifecycleTransition => "LIFECYCLE_TRANSITION",
            Event::ServicesStopped => "SERVICES_STOPPED",
            Event::ServicesStarted => "SERVICES_STARTED",
            Event::ServiceStatus => "SERVICE_STATUS",
            Event::SchemaMigrated => "SCHEMA_MIGRATED",
            Event::BootstrapAttempt => "BOOTSTRAP_ATTEMPT",
            Event::BootstrapRetry => "BOOTSTRAP_RETRY",
            Event::BootstrapComplete => "BOOTSTRAP_COMPLETE",

            Event::WorkDirRemoved => "WORK_DIR_REMOVED",
        }
    }

    /// Returns true if this event ends the run unsuccessfully
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RestoreFailed)
    }

    /// Returns true if this event reports a tolerated problem
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::AssetUploadFailed
                | Event::IdentityFieldMissing
                | Event::SessionCloseFailed
                | Event::BootstrapRetry
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        let events = [
            Event::RestoreStart,
            Event::CollectionRotated,
            Event::NamespaceAbsent,
            Event::AssetUploadFailed,
            Event::BootstrapRetry,
            Event::WorkDirRemoved,
        ];
        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_and_warning_events() {
        assert!(Event::RestoreFailed.is_fatal());
        assert!(!Event::RestoreComplete.is_fatal());
        assert!(Event::AssetUploadFailed.is_warning());
        assert!(!Event::AssetUploaded.is_warning());
    }
}
