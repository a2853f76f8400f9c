//! querysync CLI entry point

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use querysync::compiler::TemplateScanCompiler;
use querysync::daemon::{EngineConfig, QueryEngine};
use querysync::schema::ComponentPath;
use querysync::store::MemoryStore;
use querysync::{Cli, QuerySyncError};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> querysync::Result<()> {
    let root = resolve_root(cli.root())?;
    tracing::info!("[CLI] project root: {}", root.display());

    let store = Arc::new(MemoryStore::new());
    let compiler = TemplateScanCompiler::new(root.clone());
    seed_routes(&store, &compiler)?;

    let config = EngineConfig {
        mode: cli.engine_mode(),
        quiet_period: cli.quiet_period(),
        emit_events: cli.events,
        watch_root: Some(root),
    };
    let engine = QueryEngine::new(store, Box::new(compiler), config);
    engine.run()
}

fn resolve_root(root: Option<&PathBuf>) -> querysync::Result<PathBuf> {
    let root = match root {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(QuerySyncError::FileNotFound {
            path: root.display().to_string(),
        });
    }
    Ok(root)
}

/// Register one route per discovered template, rooted at its path relative
/// to the project root. A real site generator derives routes from its page
/// definitions; the reference binary treats the template tree as the site
/// map.
fn seed_routes(store: &MemoryStore, compiler: &TemplateScanCompiler) -> querysync::Result<()> {
    let templates = compiler.discover_templates()?;
    for template in &templates {
        let route = route_for_template(template);
        store.set_route(route, ComponentPath::from_path(template));
    }
    tracing::info!("[CLI] registered {} route(s)", templates.len());
    Ok(())
}

fn route_for_template(template: &Path) -> String {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem == "index" {
        "/".to_string()
    } else {
        format!("/{}", stem)
    }
}
