//! ObservationScope for per-phase begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when closed explicitly
//! - Logs `{name}_INCOMPLETE` if dropped without being closed

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs start and end of a unit of work. `Send`, so it may be
/// held across `.await`.
///
/// ```ignore
/// let scope = ObservationScope::new("ROTATE");
/// // ... do work ...
/// scope.complete_with_fields(&[("rotated", "4")]);
/// ```
pub struct ObservationScope {
    name: String,
    completed: bool,
    timer: Timer,
}

impl ObservationScope {
    /// Create a new observation scope, logging `{name}_BEGIN` immediately.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Logger::info(&format!("{}_BEGIN", name), &[]);
        Self {
            name,
            completed: false,
            timer: Timer::new(),
        }
    }

    /// Mark the scope as completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed with extra fields
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let elapsed = self.timer.elapsed_ms();
        let mut fields: Vec<(&str, &str)> = vec![("elapsed_ms", elapsed.as_str())];
        fields.extend(extra_fields.iter().copied());
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Mark the scope as failed. Logs `{name}_FAILED` at ERROR.
    pub fn fail(mut self, reason: &str) {
        self.completed = true;
        let elapsed = self.timer.elapsed_ms();
        Logger::error(
            &format!("{}_FAILED", self.name),
            &[("elapsed_ms", elapsed.as_str()), ("reason", reason)],
        );
    }

    /// Check if the scope has been closed
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_scope_is_send() {
        assert_send::<ObservationScope>();
    }

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::new("TEST");
        assert!(!scope.is_completed());
        scope.complete_with_fields(&[("result", "ok")]);
    }

    #[test]
    fn test_scope_fail_and_drop() {
        ObservationScope::new("TEST").fail("boom");
        drop(ObservationScope::new("TEST"));
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let ms: u64 = timer.elapsed_ms().parse().unwrap();
        assert!(ms >= 5);
    }
}
