//! Query reconciliation daemon
//!
//! The long-running side of the crate: the single-writer engine loop, the
//! debounced trigger, the watch set, and the event output.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────────────────┐
//! │   notify    │──>│ DebouncedTrigger │──>│       QueryEngine        │
//! │   watcher   │   │  (quiet period)  │   │  snapshot -> compile ->  │
//! └─────────────┘   └──────────────────┘   │  reconcile -> apply      │
//!        ^                                 └──────────┬───────────────┘
//!        │                                            │
//!        └──────────── WatchSet growth <──────────────┘
//!
//! route-removal events ──────────────────> QueryEngine (same timeline)
//! ```
//!
//! Everything that mutates the store runs on the engine thread; event
//! sources only schedule messages onto its channel.

pub mod engine;
pub mod events;
pub mod trigger;
pub mod watch;

pub use engine::{
    CycleStats, EngineConfig, EngineHandle, EngineMode, EngineMsg, QueryEngine,
};
pub use events::{ComponentRemovedEvent, EventEmitter, ReconcileCompletedEvent};
pub use trigger::{DebouncedTrigger, DEFAULT_QUIET_PERIOD};
pub use watch::{FileWatcher, WatchSet};
