//! Core data model for query reconciliation
//!
//! These are the plain-data types shared across the crate: component and
//! query identities, the snapshot the store hands to the engine, and the
//! compiler's per-cycle output.

use std::fmt;
use std::path::Path;

use ahash::AHashMap;
use serde::Serialize;

use crate::paths::normalize_component_path;

/// Identity of a template component: its absolute path in normalized
/// forward-slash form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentPath(String);

impl ComponentPath {
    /// Wrap an already-normalized path string.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Normalize a filesystem path into a component identity.
    pub fn from_path(path: &Path) -> Self {
        Self(normalize_component_path(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a component-scoped query.
///
/// Derived from the owning component path, never from the query text, so it
/// survives every edit to the query itself. At most one component-scoped
/// query exists per component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryId(String);

/// Fixed seeds so the path fingerprint is deterministic for the life of
/// the process. Ids never persist, so cross-version portability of the
/// hash does not matter here.
const ID_FINGERPRINT_SEEDS: (u64, u64, u64, u64) = (
    0x7175_6572_7969_6421,
    0x636f_6d70_6f6e_656e,
    0x7369_7465_2d70_6174,
    0x6669_6e67_6572_7072,
);

impl QueryId {
    /// Derive the id for the component-scoped query owned by `path`.
    ///
    /// The slug keeps ids readable in logs and event output; the trailing
    /// fingerprint of the full normalized path keeps ids distinct for
    /// paths whose slugs collide (`/site/a/b.tmpl` vs `/site/a.b.tmpl`):
    /// `/site/src/header.tmpl` -> `cq--site-src-header-tmpl-1a2b3c4d`.
    pub fn for_component(path: &ComponentPath) -> Self {
        let mut slug = String::with_capacity(path.as_str().len());
        for ch in path.as_str().chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        let state = ahash::RandomState::with_seeds(
            ID_FINGERPRINT_SEEDS.0,
            ID_FINGERPRINT_SEEDS.1,
            ID_FINGERPRINT_SEEDS.2,
            ID_FINGERPRINT_SEEDS.3,
        );
        let fingerprint = state.hash_one(path.as_str().as_bytes()) as u32;
        Self(format!("cq--{}-{:08x}", slug, fingerprint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tracked template component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Normalized template path (identity)
    pub path: ComponentPath,
    /// Last-extracted query text, possibly empty
    pub query_text: String,
}

/// A component-scoped ("static") query as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentScopedQuery {
    /// Stable identity, permanent across text edits
    pub id: QueryId,
    /// Display name for reporting
    pub name: String,
    /// Owning component
    pub component_path: ComponentPath,
    /// Raw query text
    pub text: String,
    /// Hash of the normalized text
    pub hash: String,
}

/// One compiler-extracted query, recomputed every cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedQuery {
    /// Display name for reporting
    pub name: String,
    /// Raw query text
    pub text: String,
    /// Hash of the normalized text
    pub hash: String,
    /// True for a component-scoped query, false for a route/page query
    pub component_scoped: bool,
}

/// Result of one compiler invocation.
///
/// `Failed` means a transient failure the compiler already reported: it is
/// "no change", never "everything removed". The engine performs zero
/// mutations for a failed cycle and retries on the next trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileResult {
    Success(AHashMap<ComponentPath, ExtractedQuery>),
    Failed,
}

/// Immutable point-in-time copy of the store's component and
/// component-scoped-query registries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub components: AHashMap<ComponentPath, Component>,
    pub static_queries: AHashMap<QueryId, ComponentScopedQuery>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_component_path_from_windows_path() {
        let path = ComponentPath::from_path(&PathBuf::from(r"C:\site\a.tmpl"));
        assert_eq!(path.as_str(), "C:/site/a.tmpl");
    }

    #[test]
    fn test_query_id_slug() {
        let path = ComponentPath::new("/site/src/header.tmpl");
        let id = QueryId::for_component(&path);
        assert!(id.as_str().starts_with("cq--site-src-header-tmpl-"));
    }

    #[test]
    fn test_query_id_stable_across_text_edits() {
        // Identity depends only on the component path
        let path = ComponentPath::new("/site/src/header.tmpl");
        assert_eq!(QueryId::for_component(&path), QueryId::for_component(&path));
    }

    #[test]
    fn test_query_id_collapses_separator_runs() {
        let path = ComponentPath::new("//server/share/a b.tmpl");
        assert!(QueryId::for_component(&path)
            .as_str()
            .starts_with("cq--server-share-a-b-tmpl-"));
    }

    #[test]
    fn test_query_id_distinct_for_colliding_slugs() {
        // These two source sites collapse to the same slug; the path
        // fingerprint keeps their identities distinct.
        let a = QueryId::for_component(&ComponentPath::new("/site/a/b.tmpl"));
        let b = QueryId::for_component(&ComponentPath::new("/site/a.b.tmpl"));
        assert_ne!(a, b);
    }
}
