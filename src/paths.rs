//! Component path normalization
//!
//! Component identity is the absolute template path in forward-slash form,
//! so the same file hashes and compares identically on Unix and Windows.
//! All paths crossing the crate boundary (compiler output, watcher events,
//! route registrations) go through [`normalize_component_path`] before they
//! are used as identities.

use std::path::Path;

/// Normalize a template path into the canonical component identity form.
///
/// - Windows `\\?\` / `\\?\UNC\` canonicalization prefixes are stripped
/// - Backslash separators become forward slashes
/// - No filesystem access: purely lexical, so it works for paths that no
///   longer exist (e.g. a deleted template reported by the watcher)
pub fn normalize_component_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    let s = if let Some(stripped) = s.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{}", stripped)
    } else if let Some(stripped) = s.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        s.into_owned()
    };
    s.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_unix_path_unchanged() {
        let path = PathBuf::from("/site/src/templates/post.tmpl");
        assert_eq!(
            normalize_component_path(&path),
            "/site/src/templates/post.tmpl"
        );
    }

    #[test]
    fn test_backslashes_become_forward_slashes() {
        let path = PathBuf::from(r"C:\site\src\templates\post.tmpl");
        assert_eq!(
            normalize_component_path(&path),
            "C:/site/src/templates/post.tmpl"
        );
    }

    #[test]
    fn test_extended_length_prefix_stripped() {
        let path = PathBuf::from(r"\\?\C:\site\post.tmpl");
        assert_eq!(normalize_component_path(&path), "C:/site/post.tmpl");
    }

    #[test]
    fn test_unc_prefix_stripped() {
        let path = PathBuf::from(r"\\?\UNC\server\share\post.tmpl");
        assert_eq!(normalize_component_path(&path), "//server/share/post.tmpl");
    }
}
