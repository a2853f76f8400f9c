//! Incremental query reconciliation
//!
//! The diff at the heart of the engine: compare the store snapshot against
//! the fresh compiler output and compute the minimal set of store mutations
//! and downstream work. Pure function, no I/O; the daemon applies the
//! resulting commands under its single-writer model.
//!
//! # Algorithm
//!
//! 1. Queries whose owning component dropped out of the fresh output (or is
//!    now non-component-scoped/empty) are removed, and their dependency
//!    edges reset.
//! 2. Every snapshot component's raw-text field is re-recorded when the
//!    fresh text differs, including components whose query is not
//!    component-scoped.
//! 3. Every fresh component-scoped query is upserted when new or changed
//!    (hash OR raw text), marked dirty for dependency re-analysis, and its
//!    component marked will-run and requested for watching.
//! 4. On the bootstrap pass only, a route-style query found in a component
//!    the snapshot has never seen produces a misplaced-query warning; the
//!    query will not run.
//!
//! # Comparison policy
//!
//! Hash and raw text are OR'd: the hash is computed over a normalized form
//! that survives cosmetic reformatting, while raw-text differences that keep
//! the hash stable (inert formatting in referenced fragments) must still
//! propagate. Equal in both means no upsert.

use ahash::{AHashMap, AHashSet};

use crate::schema::{ComponentPath, ExtractedQuery, QueryId, StoreSnapshot};
use crate::store::StoreCommand;

/// A route-style query found in a component that no route owns; it will
/// never run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisplacedQueryWarning {
    pub component_path: ComponentPath,
    pub name: String,
}

/// Output of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileResult {
    /// Store mutations, in application order
    pub commands: Vec<StoreCommand>,
    /// Components whose query will run downstream
    pub will_run: AHashSet<ComponentPath>,
    /// Components holding a query that will not run
    pub wont_run: AHashSet<ComponentPath>,
    /// Components to add to the watch set
    pub watch_requests: Vec<ComponentPath>,
    /// Queries marked for re-extraction / dependency analysis
    pub dirty_queries: AHashSet<QueryId>,
    /// Misplaced-query warnings (bootstrap pass only)
    pub warnings: Vec<MisplacedQueryWarning>,
}

impl ReconcileResult {
    /// True when the pass produced no store mutations.
    pub fn is_noop(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Does this fresh entry still count as a runnable component-scoped query?
///
/// Empty text never classifies as component-scoped, regardless of the flag
/// the compiler reported.
fn is_runnable_static(entry: &ExtractedQuery) -> bool {
    entry.component_scoped && !entry.text.trim().is_empty()
}

/// Diff the snapshot against fresh compiler output.
///
/// `first_run` marks the bootstrap pass; it only affects the misplaced-query
/// warning (step 4), preserved as bootstrap-only behavior.
pub fn reconcile(
    snapshot: &StoreSnapshot,
    fresh: &AHashMap<ComponentPath, ExtractedQuery>,
    first_run: bool,
) -> ReconcileResult {
    let mut result = ReconcileResult::default();
    let mut dependency_resets: AHashSet<QueryId> = AHashSet::new();

    // 1. Removed component-scoped queries
    for (id, prior) in &snapshot.static_queries {
        let gone = match fresh.get(&prior.component_path) {
            None => true,
            Some(entry) => !is_runnable_static(entry),
        };
        if gone {
            result.commands.push(StoreCommand::RemoveComponentScopedQuery {
                id: id.clone(),
            });
            dependency_resets.insert(id.clone());
        }
    }

    // 2. Per-component base text update. Only emit when the text actually
    // moved, so an unchanged compile is a zero-command pass.
    for (path, component) in &snapshot.components {
        let fresh_text = fresh
            .get(path)
            .map(|entry| entry.text.as_str())
            .unwrap_or("");
        if component.query_text != fresh_text {
            result.commands.push(StoreCommand::RecordExtractedQueryText {
                path: path.clone(),
                text: fresh_text.to_string(),
            });
        }
    }

    // 3. Component-scoped query upsert
    for (path, entry) in fresh {
        if !is_runnable_static(entry) {
            continue;
        }
        let id = QueryId::for_component(path);
        let changed = match snapshot.static_queries.get(&id) {
            None => true,
            // Hash OR text: either difference propagates
            Some(prior) => prior.hash != entry.hash || prior.text != entry.text,
        };
        if changed {
            result.commands.push(StoreCommand::UpsertComponentScopedQuery {
                id: id.clone(),
                name: entry.name.clone(),
                component_path: path.clone(),
                text: entry.text.clone(),
                hash: entry.hash.clone(),
            });
            dependency_resets.insert(id.clone());
            result.dirty_queries.insert(id);
        }
        result.will_run.insert(path.clone());
        result.watch_requests.push(path.clone());
    }

    // 4. Route-style queries discovered outside any known component: warn on
    // the bootstrap pass only.
    for (path, entry) in fresh {
        if entry.component_scoped {
            continue;
        }
        if first_run && !snapshot.components.contains_key(path) {
            result.wont_run.insert(path.clone());
            result.warnings.push(MisplacedQueryWarning {
                component_path: path.clone(),
                name: entry.name.clone(),
            });
        }
    }

    if !dependency_resets.is_empty() {
        result.commands.push(StoreCommand::DeleteQueryDependencies {
            ids: dependency_resets,
        });
    }

    result.watch_requests.sort();
    result.watch_requests.dedup();
    result
}
