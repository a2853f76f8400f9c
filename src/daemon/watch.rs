//! Watch set and file-system watcher integration
//!
//! [`WatchSet`] tracks which component paths must be observed. It grows
//! monotonically: once a component is known to hold a runnable query it is
//! watched for the life of the process, since un-watching risks missing a
//! re-addition and a small over-watch is cheap.
//!
//! Before the live watcher starts (pre-bootstrap-midpoint), observe requests
//! are buffered; on activation all buffered paths are forwarded, and later
//! requests forward immediately. Components discovered mid-bootstrap are
//! therefore never silently un-watched.
//!
//! [`FileWatcher`] wires `notify` + `notify-debouncer-mini` into the engine
//! channel. The OS-level debounce only batches raw event delivery; the
//! scheduling contract lives in [`super::trigger::DebouncedTrigger`].

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

use ahash::AHashSet;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};

use crate::error::Result;
use crate::schema::ComponentPath;

use super::engine::EngineMsg;

/// Monotonically growing set of watched component paths.
#[derive(Debug, Default)]
pub struct WatchSet {
    paths: AHashSet<ComponentPath>,
    /// Observed before activation, not yet forwarded to the live watcher
    buffered: Vec<ComponentPath>,
    active: bool,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request observation of a component path. Idempotent.
    ///
    /// Returns the path when the caller must forward it to the live watcher
    /// (i.e. the set is active and the path is new); before activation the
    /// path is buffered instead.
    pub fn observe(&mut self, path: ComponentPath) -> Option<ComponentPath> {
        if !self.paths.insert(path.clone()) {
            return None;
        }
        if self.active {
            Some(path)
        } else {
            self.buffered.push(path);
            None
        }
    }

    /// Activate forwarding and drain the buffered paths for the caller to
    /// register with the live watcher.
    pub fn activate(&mut self) -> Vec<ComponentPath> {
        self.active = true;
        std::mem::take(&mut self.buffered)
    }

    pub fn contains(&self, path: &ComponentPath) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Debounce window for raw OS event delivery. Short on purpose: coalescing
/// is the trigger's job.
const RAW_EVENT_WINDOW: Duration = Duration::from_millis(20);

/// Live file-system watcher feeding change notifications into the engine.
pub struct FileWatcher {
    debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl FileWatcher {
    /// Start the watcher. Delivered paths are forwarded as
    /// [`EngineMsg::FilesChanged`]; the send is non-blocking and a closed
    /// engine channel is ignored (the daemon is shutting down).
    pub fn start(tx: Sender<EngineMsg>) -> Result<Self> {
        let debouncer = new_debouncer(RAW_EVENT_WINDOW, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<_> = events
                    .into_iter()
                    .filter(|event| matches!(event.kind, DebouncedEventKind::Any))
                    .map(|event| event.path)
                    .collect();
                if !paths.is_empty() {
                    tracing::debug!("[WATCHER] {} changed paths", paths.len());
                    let _ = tx.send(EngineMsg::FilesChanged(paths));
                }
            }
            Err(error) => {
                tracing::error!("[WATCHER] notify error: {:?}", error);
            }
        })?;
        Ok(Self { debouncer })
    }

    /// Register one template file with the OS watcher.
    pub fn watch_path(&mut self, path: &Path) -> Result<()> {
        self.debouncer
            .watcher()
            .watch(path, RecursiveMode::NonRecursive)?;
        tracing::debug!("[WATCHER] now watching {}", path.display());
        Ok(())
    }

    /// Watch a directory tree (the fixed source globs the daemon starts
    /// from), in addition to dynamically observed component files.
    pub fn watch_tree(&mut self, root: &Path) -> Result<()> {
        self.debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)?;
        tracing::info!("[WATCHER] watching tree {}", root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ComponentPath {
        ComponentPath::new(s)
    }

    #[test]
    fn test_observe_is_idempotent() {
        let mut set = WatchSet::new();
        set.activate();
        assert_eq!(set.observe(path("/a.tmpl")), Some(path("/a.tmpl")));
        assert_eq!(set.observe(path("/a.tmpl")), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_buffers_until_activated() {
        let mut set = WatchSet::new();
        assert_eq!(set.observe(path("/a.tmpl")), None);
        assert_eq!(set.observe(path("/b.tmpl")), None);
        assert!(set.contains(&path("/a.tmpl")));

        let buffered = set.activate();
        assert_eq!(buffered, vec![path("/a.tmpl"), path("/b.tmpl")]);

        // Post-activation observes forward immediately, once
        assert_eq!(set.observe(path("/c.tmpl")), Some(path("/c.tmpl")));
        assert_eq!(set.observe(path("/b.tmpl")), None);
    }

    #[test]
    fn test_activate_drains_buffer_once() {
        let mut set = WatchSet::new();
        set.observe(path("/a.tmpl"));
        assert_eq!(set.activate().len(), 1);
        assert!(set.activate().is_empty());
    }

    #[test]
    fn test_membership_is_monotonic() {
        let mut set = WatchSet::new();
        set.observe(path("/a.tmpl"));
        set.activate();
        set.observe(path("/b.tmpl"));
        // No removal API exists; everything ever observed stays watched
        assert!(set.contains(&path("/a.tmpl")));
        assert!(set.contains(&path("/b.tmpl")));
        assert_eq!(set.len(), 2);
    }
}
