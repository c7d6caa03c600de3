//! Observability for tenant-restore
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Per-phase observation scopes
//!
//! Observability is write-only: nothing in the pipeline reads back what was logged,
//! and a failure to write a log line never fails a restore.
//!
//! ```ignore
//! use tenant_restore::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::CollectionRotated, &[("from", "users")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::{ObservationScope, Timer};

fn severity_for(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_warning() {
        Severity::Warn
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}
