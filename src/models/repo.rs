//! Repository references produced by discovery.

use std::path::{Component, Path, PathBuf};

/// Fallback label when a repository path has no usable file name.
const UNNAMED_REPO: &str = "repo";

/// A directory with a `.git` directory at its root.
///
/// `name` is inserted between the `a/`/`b/` prefix and each file path in the
/// repository's diff, so files with the same relative path in different
/// repositories stay distinguishable once fragments are concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub path: PathBuf,
    pub name: String,
}

impl RepoRef {
    /// Builds a reference for `path`, naming it relative to `root`.
    pub fn new(root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = display_name(root, &path);
        Self { path, name }
    }
}

/// Path of `path` relative to `root` with `/` separators, or the directory's
/// own name when it is the root itself.
pub fn display_name(root: &Path, path: &Path) -> String {
    let relative: Vec<String> = path
        .strip_prefix(root)
        .ok()
        .map(|rel| {
            rel.components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if !relative.is_empty() {
        return relative.join("/");
    }

    own_name(path)
        .or_else(|| path.canonicalize().ok().and_then(|p| own_name(&p)))
        .unwrap_or_else(|| UNNAMED_REPO.to_string())
}

fn own_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
}
