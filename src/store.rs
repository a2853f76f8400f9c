//! Application store interface and in-memory implementation
//!
//! The engine never mutates the store directly: it emits [`StoreCommand`]s
//! and the store collaborator applies them. Commands are assumed to always
//! succeed (the store is local, synchronous, in-process), so `apply` is
//! infallible.
//!
//! # Thread Safety
//!
//! [`MemoryStore`] wraps its registries in a `parking_lot::RwLock`:
//! `snapshot()` takes one read guard for the whole copy, giving the engine
//! an atomic point-in-time view with no interleaved partial state.

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;

use crate::schema::{Component, ComponentPath, ComponentScopedQuery, QueryId, StoreSnapshot};

/// A mutation command issued by the engine and consumed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// Create or replace the component-scoped query for a component
    UpsertComponentScopedQuery {
        id: QueryId,
        name: String,
        component_path: ComponentPath,
        text: String,
        hash: String,
    },
    /// Remove a component-scoped query that no longer exists in source
    RemoveComponentScopedQuery { id: QueryId },
    /// Drop the dependency edges recorded for these queries so the next run
    /// re-derives them
    DeleteQueryDependencies { ids: AHashSet<QueryId> },
    /// Keep the component's raw-text field in sync with the latest extract
    RecordExtractedQueryText { path: ComponentPath, text: String },
    /// Remove a component no route references anymore
    RemoveComponent { path: ComponentPath },
}

/// Store interface the engine depends on.
pub trait Store: Send + Sync {
    /// Atomic point-in-time copy of the component and query registries.
    fn snapshot(&self) -> StoreSnapshot;

    /// Set of component paths referenced by at least one route.
    fn route_components(&self) -> AHashSet<ComponentPath>;

    /// Apply one mutation command. Infallible by contract.
    fn apply(&self, command: StoreCommand);
}

#[derive(Default)]
struct StoreInner {
    components: AHashMap<ComponentPath, Component>,
    static_queries: AHashMap<QueryId, ComponentScopedQuery>,
    /// route path -> owning component
    routes: AHashMap<String, ComponentPath>,
    /// query id -> recorded dependency edges (node ids)
    query_dependencies: AHashMap<QueryId, AHashSet<String>>,
}

/// In-memory store used by the CLI binary and the test suite.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component without any route (e.g. loaded from a stale
    /// persisted cache).
    pub fn register_component(&self, path: ComponentPath) {
        let mut inner = self.inner.write();
        inner.components.entry(path.clone()).or_insert(Component {
            path,
            query_text: String::new(),
        });
    }

    /// Register a route and its owning component, creating the component
    /// entry if it is new.
    pub fn set_route(&self, route: impl Into<String>, component: ComponentPath) {
        let mut inner = self.inner.write();
        inner.routes.insert(route.into(), component.clone());
        inner
            .components
            .entry(component.clone())
            .or_insert(Component {
                path: component,
                query_text: String::new(),
            });
    }

    /// Remove a route. The caller is responsible for notifying the engine's
    /// route-deletion listener; the store itself never cascades.
    pub fn remove_route(&self, route: &str) -> Option<ComponentPath> {
        self.inner.write().routes.remove(route)
    }

    /// Record a dependency edge for a query (normally done by the downstream
    /// query runner; exposed for tests).
    pub fn add_query_dependency(&self, id: QueryId, node_id: impl Into<String>) {
        self.inner
            .write()
            .query_dependencies
            .entry(id)
            .or_default()
            .insert(node_id.into());
    }

    /// Dependency edges currently recorded for a query.
    pub fn query_dependencies(&self, id: &QueryId) -> AHashSet<String> {
        self.inner
            .read()
            .query_dependencies
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Store for MemoryStore {
    fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        StoreSnapshot {
            components: inner.components.clone(),
            static_queries: inner.static_queries.clone(),
        }
    }

    fn route_components(&self) -> AHashSet<ComponentPath> {
        self.inner.read().routes.values().cloned().collect()
    }

    fn apply(&self, command: StoreCommand) {
        let mut inner = self.inner.write();
        match command {
            StoreCommand::UpsertComponentScopedQuery {
                id,
                name,
                component_path,
                text,
                hash,
            } => {
                inner
                    .components
                    .entry(component_path.clone())
                    .or_insert_with(|| Component {
                        path: component_path.clone(),
                        query_text: String::new(),
                    });
                inner.static_queries.insert(
                    id.clone(),
                    ComponentScopedQuery {
                        id,
                        name,
                        component_path,
                        text,
                        hash,
                    },
                );
            }
            StoreCommand::RemoveComponentScopedQuery { id } => {
                inner.static_queries.remove(&id);
            }
            StoreCommand::DeleteQueryDependencies { ids } => {
                for id in ids {
                    inner.query_dependencies.remove(&id);
                }
            }
            StoreCommand::RecordExtractedQueryText { path, text } => {
                let entry = inner.components.entry(path.clone()).or_insert(Component {
                    path,
                    query_text: String::new(),
                });
                entry.query_text = text;
            }
            StoreCommand::RemoveComponent { path } => {
                inner.components.remove(&path);
                inner
                    .static_queries
                    .retain(|_, q| q.component_path != path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ComponentPath {
        ComponentPath::new(s)
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = MemoryStore::new();
        store.register_component(path("/a.tmpl"));
        let snap = store.snapshot();
        store.register_component(path("/b.tmpl"));
        assert_eq!(snap.components.len(), 1);
        assert_eq!(store.snapshot().components.len(), 2);
    }

    #[test]
    fn test_upsert_creates_component_entry() {
        let store = MemoryStore::new();
        let id = QueryId::for_component(&path("/a.tmpl"));
        store.apply(StoreCommand::UpsertComponentScopedQuery {
            id: id.clone(),
            name: "a".into(),
            component_path: path("/a.tmpl"),
            text: "{ title }".into(),
            hash: "h1".into(),
        });
        let snap = store.snapshot();
        assert!(snap.components.contains_key(&path("/a.tmpl")));
        assert_eq!(snap.static_queries[&id].text, "{ title }");
    }

    #[test]
    fn test_remove_component_drops_owned_query() {
        let store = MemoryStore::new();
        let id = QueryId::for_component(&path("/a.tmpl"));
        store.apply(StoreCommand::UpsertComponentScopedQuery {
            id: id.clone(),
            name: "a".into(),
            component_path: path("/a.tmpl"),
            text: "{ title }".into(),
            hash: "h1".into(),
        });
        store.apply(StoreCommand::RemoveComponent {
            path: path("/a.tmpl"),
        });
        let snap = store.snapshot();
        assert!(snap.components.is_empty());
        assert!(snap.static_queries.is_empty());
    }

    #[test]
    fn test_delete_query_dependencies() {
        let store = MemoryStore::new();
        let id = QueryId::for_component(&path("/a.tmpl"));
        store.add_query_dependency(id.clone(), "node-1");
        assert_eq!(store.query_dependencies(&id).len(), 1);

        let mut ids = AHashSet::new();
        ids.insert(id.clone());
        store.apply(StoreCommand::DeleteQueryDependencies { ids });
        assert!(store.query_dependencies(&id).is_empty());
    }

    #[test]
    fn test_record_extracted_query_text() {
        let store = MemoryStore::new();
        store.register_component(path("/a.tmpl"));
        store.apply(StoreCommand::RecordExtractedQueryText {
            path: path("/a.tmpl"),
            text: "{ title }".into(),
        });
        assert_eq!(
            store.snapshot().components[&path("/a.tmpl")].query_text,
            "{ title }"
        );
    }

    #[test]
    fn test_route_components() {
        let store = MemoryStore::new();
        store.set_route("/blog", path("/blog.tmpl"));
        store.set_route("/about", path("/about.tmpl"));
        store.set_route("/blog/2", path("/blog.tmpl"));
        let live = store.route_components();
        assert_eq!(live.len(), 2);
        assert!(live.contains(&path("/blog.tmpl")));
    }
}
