//! querysync: incremental reconciliation of template-embedded data queries
//!
//! This library keeps a site generator's store consistent with the data
//! queries embedded in its UI template files. Whenever source changes, the
//! engine re-derives the component/query mapping and propagates the minimal
//! set of downstream effects: store mutations, re-runs of dependent queries,
//! removal of stale entries, and developer warnings.
//!
//! The core is the incremental reconciliation engine: snapshot/diff logic
//! deciding what changed after any recompilation of queries from source,
//! plus the debounced file-watch scheduler deciding when to recompile.
//! Query execution, page rendering, and store persistence live elsewhere;
//! the compiler and the store are collaborators behind the
//! [`compiler::QueryCompiler`] and [`store::Store`] traits.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use querysync::{
//!     EngineConfig, EngineMode, MemoryStore, QueryEngine, TemplateScanCompiler,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! let compiler = TemplateScanCompiler::new("/site/src".into());
//! let config = EngineConfig {
//!     mode: EngineMode::Build,
//!     ..Default::default()
//! };
//! QueryEngine::new(store, Box::new(compiler), config).run()?;
//! ```

pub mod cli;
pub mod compiler;
pub mod daemon;
pub mod error;
pub mod paths;
pub mod reconcile;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use cli::{Cli, Commands};
pub use compiler::{content_hash, is_template_path, QueryCompiler, TemplateScanCompiler};
pub use daemon::{
    CycleStats, DebouncedTrigger, EngineConfig, EngineHandle, EngineMode, EngineMsg,
    QueryEngine, WatchSet,
};
pub use error::{QuerySyncError, Result};
pub use paths::normalize_component_path;
pub use reconcile::{reconcile, MisplacedQueryWarning, ReconcileResult};
pub use schema::{
    CompileResult, Component, ComponentPath, ComponentScopedQuery, ExtractedQuery, QueryId,
    StoreSnapshot,
};
pub use store::{MemoryStore, Store, StoreCommand};
