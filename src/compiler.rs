//! Query compiler interface and the template-scan reference implementation
//!
//! The compiler is an external collaborator: given current source state it
//! returns one [`ExtractedQuery`] per query-bearing component, or signals a
//! transient failure. Failure is "no change" for the engine, never
//! "everything removed".
//!
//! [`TemplateScanCompiler`] is the reference collaborator used by the CLI
//! binary and the test suite. It walks a source root for template files and
//! extracts the first `<static-query>` or `<page-query>` block from each.
//! Query *syntax* is not validated here; that is the downstream runner's
//! concern.

use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashMap;

use crate::schema::{CompileResult, ComponentPath, ExtractedQuery};

/// Compiler collaborator interface.
///
/// Called once per reconciliation cycle. Implementations report their own
/// failures before returning [`CompileResult::Failed`].
pub trait QueryCompiler: Send {
    fn compile(&mut self) -> CompileResult;
}

/// Fixed seeds so hashes are deterministic for the life of the process.
/// ahash output is not guaranteed stable across ahash versions or
/// architectures; fine here because hashes never outlive one cycle, but a
/// persistence change would need a portable hash instead.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x5163_6f6d_7071_7279,
    0x7175_6572_7973_796e,
    0x6863_7461_7773_6574,
    0x7265_636f_6e63_696c,
);

/// Hash of the normalized (whitespace-collapsed) query text.
///
/// Cosmetic reformatting of the query body does not change the hash; the
/// reconciliation engine still compares raw text in addition, so inert
/// differences in referenced fragments propagate (hash OR text policy).
pub fn content_hash(text: &str) -> String {
    let normalized: Vec<&str> = text.split_whitespace().collect();
    let normalized = normalized.join(" ");
    let state = ahash::RandomState::with_seeds(HASH_SEEDS.0, HASH_SEEDS.1, HASH_SEEDS.2, HASH_SEEDS.3);
    format!("{:016x}", state.hash_one(normalized.as_bytes()))
}

/// File extensions treated as template sources.
const TEMPLATE_EXTENSIONS: &[&str] = &["tmpl", "html", "vue", "svelte"];

/// Check whether a path looks like a template source file.
pub fn is_template_path(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            TEMPLATE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Template scanner: the reference query compiler.
pub struct TemplateScanCompiler {
    root: PathBuf,
    max_depth: usize,
}

impl TemplateScanCompiler {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_depth: 10,
        }
    }

    /// Collect template files under the root, depth-limited, skipping
    /// hidden directories and common build output.
    pub fn discover_templates(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_templates(&self.root, 0, self.max_depth, &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn collect_templates(
    dir: &Path,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    if depth > max_depth {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if name.starts_with('.') || name == "node_modules" || name == "public" {
                continue;
            }
            collect_templates(&path, depth + 1, max_depth, out)?;
        } else if is_template_path(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Extract the first query block from template source.
///
/// Returns `(text, component_scoped)`; `None` when the file embeds no query.
fn extract_query_block(source: &str) -> Option<(String, bool)> {
    for (open, close, scoped) in [
        ("<static-query>", "</static-query>", true),
        ("<page-query>", "</page-query>", false),
    ] {
        if let Some(start) = source.find(open) {
            let body_start = start + open.len();
            if let Some(end) = source[body_start..].find(close) {
                let text = source[body_start..body_start + end].trim().to_string();
                return Some((text, scoped));
            }
        }
    }
    None
}

/// Display name for a query, derived from the template file stem.
fn query_display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

impl QueryCompiler for TemplateScanCompiler {
    fn compile(&mut self) -> CompileResult {
        let files = match self.discover_templates() {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("[COMPILER] template scan failed: {}", e);
                return CompileResult::Failed;
            }
        };

        let mut out: AHashMap<ComponentPath, ExtractedQuery> = AHashMap::new();
        for file in files {
            let source = match fs::read_to_string(&file) {
                Ok(source) => source,
                Err(e) => {
                    // Likely an editor mid-save; fail the whole cycle and
                    // let the next trigger retry.
                    tracing::warn!("[COMPILER] cannot read {}: {}", file.display(), e);
                    return CompileResult::Failed;
                }
            };
            if let Some((text, component_scoped)) = extract_query_block(&source) {
                let hash = content_hash(&text);
                out.insert(
                    ComponentPath::from_path(&file),
                    ExtractedQuery {
                        name: query_display_name(&file),
                        text,
                        hash,
                        component_scoped,
                    },
                );
            }
        }
        tracing::debug!("[COMPILER] extracted {} queries", out.len());
        CompileResult::Success(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_ignores_reformatting() {
        assert_eq!(
            content_hash("{ title subtitle }"),
            content_hash("{\n  title\n  subtitle\n}")
        );
    }

    #[test]
    fn test_content_hash_differs_on_content() {
        assert_ne!(content_hash("{ title }"), content_hash("{ subtitle }"));
    }

    #[test]
    fn test_extract_static_query_block() {
        let source = "<div/>\n<static-query>\n{ title }\n</static-query>\n";
        let (text, scoped) = extract_query_block(source).unwrap();
        assert_eq!(text, "{ title }");
        assert!(scoped);
    }

    #[test]
    fn test_extract_page_query_block() {
        let source = "<page-query>{ posts }</page-query>";
        let (text, scoped) = extract_query_block(source).unwrap();
        assert_eq!(text, "{ posts }");
        assert!(!scoped);
    }

    #[test]
    fn test_extract_no_block() {
        assert!(extract_query_block("<div>no queries here</div>").is_none());
    }

    #[test]
    fn test_is_template_path() {
        assert!(is_template_path(Path::new("/a/header.tmpl")));
        assert!(is_template_path(Path::new("/a/page.html")));
        assert!(!is_template_path(Path::new("/a/util.rs")));
        assert!(!is_template_path(Path::new("/a/Makefile")));
    }

    #[test]
    fn test_compile_scans_templates() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("header.tmpl"),
            "<static-query>{ title }</static-query>",
        )
        .unwrap();
        fs::write(
            dir.path().join("post.tmpl"),
            "<page-query>{ post }</page-query>",
        )
        .unwrap();
        fs::write(dir.path().join("plain.tmpl"), "<div/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut compiler = TemplateScanCompiler::new(dir.path().to_path_buf());
        let result = compiler.compile();
        let CompileResult::Success(queries) = result else {
            panic!("expected success");
        };
        assert_eq!(queries.len(), 2);

        let header = ComponentPath::from_path(&dir.path().join("header.tmpl"));
        assert!(queries[&header].component_scoped);
        assert_eq!(queries[&header].text, "{ title }");
        assert_eq!(queries[&header].name, "header");

        let post = ComponentPath::from_path(&dir.path().join("post.tmpl"));
        assert!(!queries[&post].component_scoped);
    }

    #[test]
    fn test_compile_missing_root_fails() {
        let mut compiler = TemplateScanCompiler::new(PathBuf::from("/does/not/exist/xyz"));
        assert_eq!(compiler.compile(), CompileResult::Failed);
    }

    #[test]
    fn test_compile_skips_hidden_and_build_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(
            dir.path().join(".cache/a.tmpl"),
            "<static-query>{ a }</static-query>",
        )
        .unwrap();
        fs::write(
            dir.path().join("node_modules/b.tmpl"),
            "<static-query>{ b }</static-query>",
        )
        .unwrap();

        let mut compiler = TemplateScanCompiler::new(dir.path().to_path_buf());
        let CompileResult::Success(queries) = compiler.compile() else {
            panic!("expected success");
        };
        assert!(queries.is_empty());
    }
}
