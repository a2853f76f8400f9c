//! Single-writer reconciliation engine
//!
//! All store-mutating logic (bootstrap sweep, reconciliation cycles, route
//! deletions) executes on one sequential timeline: the thread that runs
//! [`QueryEngine::run`]. File-change and route-removal notifications arrive
//! asynchronously but are only ever *scheduled* onto the engine channel,
//! never executed inline, so no two mutation sequences interleave and no
//! locks are needed around the store beyond what the store itself takes.
//!
//! Bootstrap order:
//!
//! 1. route-liveness sweep (exactly once, before any reconciliation)
//! 2. initial reconciliation pass
//! 3. develop mode only: attach the live watcher and flush the watch paths
//!    buffered during the initial pass
//!
//! In build mode the engine performs exactly the one bootstrap pass and
//! skips watch setup entirely.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::compiler::QueryCompiler;
use crate::error::Result;
use crate::reconcile::{reconcile, MisplacedQueryWarning, ReconcileResult};
use crate::schema::{CompileResult, ComponentPath};
use crate::store::{Store, StoreCommand};

use super::events::{ComponentRemovedEvent, EventEmitter, ReconcileCompletedEvent};
use super::trigger::{DebouncedTrigger, DEFAULT_QUIET_PERIOD};
use super::watch::{FileWatcher, WatchSet};

/// Messages scheduled onto the engine's sequential timeline.
#[derive(Debug)]
pub enum EngineMsg {
    /// Watched files changed on disk
    FilesChanged(Vec<PathBuf>),
    /// A route was deleted; its owning component may now be orphaned
    RouteRemoved { component_path: ComponentPath },
    Shutdown,
}

/// Execution mode, normally driven by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Watch sources and reconcile continuously
    Develop,
    /// One reconciliation pass, no watching
    Build,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: EngineMode,
    /// Debounce quiet period for the trigger
    pub quiet_period: Duration,
    /// Emit JSON-lines events on stdout
    pub emit_events: bool,
    /// Directory tree to watch in addition to individual component files
    pub watch_root: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::Develop,
            quiet_period: DEFAULT_QUIET_PERIOD,
            emit_events: false,
            watch_root: None,
        }
    }
}

/// Summary of the last applied cycle, for logging, events, and tests.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub first_run: bool,
    pub upserts: usize,
    pub removals: usize,
    pub will_run: usize,
    pub wont_run: usize,
    pub duration_ms: u64,
}

/// Non-blocking handle for the event sources feeding the engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<EngineMsg>,
}

impl EngineHandle {
    /// Schedule a file-change notification. Returns immediately.
    pub fn notify_files_changed(&self, paths: Vec<PathBuf>) {
        let _ = self.tx.send(EngineMsg::FilesChanged(paths));
    }

    /// Schedule a route-removal notification. Returns immediately.
    pub fn notify_route_removed(&self, component_path: ComponentPath) {
        let _ = self.tx.send(EngineMsg::RouteRemoved { component_path });
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineMsg::Shutdown);
    }
}

/// Scheduler tick granularity for the engine loop.
const TICK: Duration = Duration::from_millis(25);

pub struct QueryEngine {
    store: Arc<dyn Store>,
    compiler: Box<dyn QueryCompiler>,
    config: EngineConfig,
    watch_set: WatchSet,
    trigger: DebouncedTrigger,
    watcher: Option<FileWatcher>,
    emitter: EventEmitter,
    tx: Sender<EngineMsg>,
    rx: Receiver<EngineMsg>,
    swept: bool,
    bootstrapped: bool,
    shutdown_requested: bool,
    last_cycle: Option<CycleStats>,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn Store>,
        compiler: Box<dyn QueryCompiler>,
        config: EngineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let emitter = EventEmitter::new(config.emit_events);
        let trigger = DebouncedTrigger::new(config.quiet_period);
        Self {
            store,
            compiler,
            config,
            watch_set: WatchSet::new(),
            trigger,
            watcher: None,
            emitter,
            tx,
            rx,
            swept: false,
            bootstrapped: false,
            shutdown_requested: false,
            last_cycle: None,
        }
    }

    /// Handle for the asynchronous event sources.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
        }
    }

    /// Stats from the last applied cycle, if any cycle has run.
    pub fn last_cycle(&self) -> Option<&CycleStats> {
        self.last_cycle.as_ref()
    }

    /// Number of component paths under observation.
    pub fn watched_components(&self) -> usize {
        self.watch_set.len()
    }

    /// Run the bootstrap sequence: sweep, initial pass, watcher attach.
    pub fn bootstrap(&mut self) -> Result<()> {
        if self.bootstrapped {
            return Ok(());
        }
        self.sweep();
        self.run_cycle(true);

        if self.config.mode == EngineMode::Develop {
            let mut watcher = FileWatcher::start(self.tx.clone())?;
            if let Some(root) = self.config.watch_root.clone() {
                watcher.watch_tree(&root)?;
            }
            for path in self.watch_set.activate() {
                Self::forward_watch(&mut watcher, &path);
            }
            self.watcher = Some(watcher);
        }
        self.bootstrapped = true;
        Ok(())
    }

    /// Run the engine to completion: bootstrap, then (develop mode) the
    /// sequential message loop until shutdown.
    pub fn run(mut self) -> Result<()> {
        self.bootstrap()?;
        if self.config.mode == EngineMode::Build {
            tracing::info!("[ENGINE] build mode: single pass complete");
            return Ok(());
        }

        tracing::info!(
            "[ENGINE] watching {} component path(s)",
            self.watch_set.len()
        );
        loop {
            match self.rx.recv_timeout(TICK) {
                Ok(msg) => self.process(msg),
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
            self.tick_at(Instant::now());
            // Checked after the tick so a shutdown drained during a cycle
            // still stops the loop
            if self.shutdown_requested {
                break;
            }
        }
        tracing::info!("[ENGINE] shut down");
        Ok(())
    }

    /// Handle one scheduled message on the engine timeline.
    pub fn process(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::FilesChanged(paths) => self.on_files_changed(paths),
            EngineMsg::RouteRemoved { component_path } => {
                self.on_route_removed(component_path)
            }
            EngineMsg::Shutdown => {
                self.shutdown_requested = true;
            }
        }
    }

    /// A shutdown message has been received (possibly drained mid-cycle).
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_requested
    }

    /// Scheduler tick: fire the trigger when its deadline passed.
    pub fn tick_at(&mut self, now: Instant) {
        if self.trigger.poll(now) {
            self.run_cycle(false);
            // Changes delivered while the cycle ran request exactly one
            // follow-up instead of resetting the deadline per message.
            self.drain_inbox();
            self.trigger.finish(Instant::now());
        }
    }

    fn drain_inbox(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => self.process(msg),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn on_files_changed(&mut self, paths: Vec<PathBuf>) {
        let relevant = paths
            .iter()
            .any(|p| self.watch_set.contains(&ComponentPath::from_path(p)));
        if !relevant && !paths.is_empty() {
            // Tree-watch noise for files we never extracted a query from
            // still schedules a cycle: a template may have just gained one.
            tracing::debug!("[ENGINE] change outside watch set: {:?}", paths);
        }
        self.trigger.note_change(Instant::now());
    }

    /// Route-deletion listener: prune the owning component when no
    /// remaining route references it.
    fn on_route_removed(&mut self, component_path: ComponentPath) {
        if self.store.route_components().contains(&component_path) {
            tracing::debug!(
                "[ENGINE] route removed but {} still referenced",
                component_path
            );
            return;
        }
        tracing::info!("[ENGINE] removing orphaned component {}", component_path);
        self.store.apply(StoreCommand::RemoveComponent {
            path: component_path.clone(),
        });
        self.emitter.emit(&ComponentRemovedEvent::now(
            component_path.as_str().to_string(),
            "route_deleted",
        ));
    }

    /// Route-liveness sweep, run exactly once before the first
    /// reconciliation. The component registry may come from a stale
    /// persisted cache referencing templates no route uses anymore.
    fn sweep(&mut self) {
        if self.swept {
            return;
        }
        self.swept = true;

        let live = self.store.route_components();
        let snapshot = self.store.snapshot();
        let mut removed = 0usize;
        for path in snapshot.components.keys() {
            if !live.contains(path) {
                self.store.apply(StoreCommand::RemoveComponent {
                    path: path.clone(),
                });
                self.emitter.emit(&ComponentRemovedEvent::now(
                    path.as_str().to_string(),
                    "unreferenced",
                ));
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!("[SWEEP] removed {} unreferenced component(s)", removed);
        }
    }

    /// One full reconciliation cycle: compile, diff, apply, report.
    fn run_cycle(&mut self, first_run: bool) {
        let start = Instant::now();
        let fresh = match self.compiler.compile() {
            CompileResult::Success(fresh) => fresh,
            CompileResult::Failed => {
                // Transient, already reported by the compiler. Zero
                // mutations; the next trigger retries.
                tracing::warn!("[ENGINE] compile failed, skipping cycle");
                return;
            }
        };

        let snapshot = self.store.snapshot();
        let result = reconcile(&snapshot, &fresh, first_run);
        let stats = CycleStats {
            first_run,
            upserts: count_upserts(&result),
            removals: count_removals(&result),
            will_run: result.will_run.len(),
            wont_run: result.wont_run.len(),
            duration_ms: 0,
        };

        for command in result.commands {
            self.store.apply(command);
        }
        for path in result.watch_requests {
            if let Some(path) = self.watch_set.observe(path) {
                if let Some(watcher) = self.watcher.as_mut() {
                    Self::forward_watch(watcher, &path);
                }
            }
        }
        self.report_warnings(&result.warnings);

        let stats = CycleStats {
            duration_ms: start.elapsed().as_millis() as u64,
            ..stats
        };
        tracing::debug!(
            "[ENGINE] cycle done: {} upsert(s), {} removal(s), {} will run ({}ms)",
            stats.upserts,
            stats.removals,
            stats.will_run,
            stats.duration_ms
        );
        self.emitter.emit(&ReconcileCompletedEvent::now(
            stats.first_run,
            stats.upserts,
            stats.removals,
            stats.will_run,
            stats.wont_run,
            stats.duration_ms,
        ));
        self.last_cycle = Some(stats);
    }

    fn report_warnings(&self, warnings: &[MisplacedQueryWarning]) {
        if warnings.is_empty() {
            return;
        }
        for warning in warnings {
            tracing::warn!(
                "[ENGINE] route query \"{}\" in {} will never run",
                warning.name,
                warning.component_path
            );
        }
        // One batched notice per cycle
        tracing::warn!(
            "[ENGINE] {} component(s) define route queries outside any route-owning component.\n\
             Route queries only run in the template a route points at.\n\
             Move each query into its route template, or make it component-scoped.",
            warnings.len()
        );
    }

    fn forward_watch(watcher: &mut FileWatcher, path: &ComponentPath) {
        if let Err(error) = watcher.watch_path(std::path::Path::new(path.as_str())) {
            // The template may have been deleted between extraction and
            // registration; the tree watch still covers its directory.
            tracing::debug!("[ENGINE] cannot watch {}: {}", path, error);
        }
    }
}

fn count_upserts(result: &ReconcileResult) -> usize {
    result
        .commands
        .iter()
        .filter(|c| matches!(c, StoreCommand::UpsertComponentScopedQuery { .. }))
        .count()
}

fn count_removals(result: &ReconcileResult) -> usize {
    result
        .commands
        .iter()
        .filter(|c| matches!(c, StoreCommand::RemoveComponentScopedQuery { .. }))
        .count()
}
