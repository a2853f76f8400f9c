//! Engine events for push notifications to tooling
//!
//! When enabled, the daemon emits JSON events to stdout, one object per
//! line, so the site-generation CLI can surface reconciliation activity:
//!
//! ```json
//! {"type":"reconcile_completed","upserts":1,"removals":0,...}
//! ```

use serde::Serialize;
use std::io::{self, Write};

/// Event emitter for sending JSON events to stdout
pub struct EventEmitter {
    enabled: bool,
}

impl EventEmitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Emit an event to stdout as JSON
    pub fn emit<E: EngineEvent>(&self, event: &E) {
        if !self.enabled {
            return;
        }

        let wrapper = EventWrapper {
            event_type: E::event_type(),
            payload: event,
        };

        if let Ok(json) = serde_json::to_string(&wrapper) {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore write errors (consumer may have closed)
            let _ = writeln!(handle, "{}", json);
            let _ = handle.flush();
        }
    }
}

/// Wrapper for events with type field
#[derive(Serialize)]
struct EventWrapper<'a, P: Serialize> {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(flatten)]
    payload: &'a P,
}

/// Trait for engine events
pub trait EngineEvent: Serialize {
    fn event_type() -> &'static str;
}

// ============================================================================
// Event Types
// ============================================================================

/// Emitted after every applied reconciliation cycle
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileCompletedEvent {
    /// Bootstrap pass or a watch-triggered cycle
    pub first_run: bool,
    /// Component-scoped queries created or replaced
    pub upserts: usize,
    /// Component-scoped queries removed
    pub removals: usize,
    /// Components whose query will run downstream
    pub will_run: usize,
    /// Components holding a query that will not run
    pub wont_run: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl EngineEvent for ReconcileCompletedEvent {
    fn event_type() -> &'static str {
        "reconcile_completed"
    }
}

impl ReconcileCompletedEvent {
    pub fn now(
        first_run: bool,
        upserts: usize,
        removals: usize,
        will_run: usize,
        wont_run: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            first_run,
            upserts,
            removals,
            will_run,
            wont_run,
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Emitted when a component is removed from the store
#[derive(Debug, Clone, Serialize)]
pub struct ComponentRemovedEvent {
    /// Normalized component path
    pub component_path: String,
    /// Why it was removed: "unreferenced" (startup sweep) or
    /// "route_deleted"
    pub reason: &'static str,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

impl EngineEvent for ComponentRemovedEvent {
    fn event_type() -> &'static str {
        "component_removed"
    }
}

impl ComponentRemovedEvent {
    pub fn now(component_path: String, reason: &'static str) -> Self {
        Self {
            component_path,
            reason,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
