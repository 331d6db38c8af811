//! Repository discovery under the workspace root.
//!
//! A repository is a directory holding a `.git` directory. Discovery never
//! looks inside a repository it has found, so nested checkouts are not
//! reported. Siblings are visited in file-name order, which keeps the output
//! order stable between requests.
//!
//! Unreadable entries below the root are skipped; an unreadable root fails the
//! whole scan.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant as StdInstant;

use tokio::time::Instant;
use walkdir::WalkDir;

use crate::config::DiscoveryPolicy;
use crate::error::DiscoveryError;
use crate::models::RepoRef;

const GIT_DIR: &str = ".git";

/// Finds repositories under `root` on the blocking pool.
pub async fn discover(
    root: &Path,
    policy: DiscoveryPolicy,
    deadline: Instant,
) -> Result<Vec<RepoRef>, DiscoveryError> {
    let owned_root = root.to_path_buf();
    let deadline = deadline.into_std();

    let task = tokio::task::spawn_blocking(move || match policy {
        DiscoveryPolicy::Recursive => find_repos_recursive(&owned_root, deadline),
        DiscoveryPolicy::Shallow => find_repos_shallow(&owned_root, deadline),
    });

    task.await.map_err(|e| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        source: io::Error::other(e),
    })?
}

pub fn is_repo_root(path: &Path) -> bool {
    path.join(GIT_DIR).is_dir()
}

/// Walks the whole tree, `root` included.
pub fn find_repos_recursive(
    root: &Path,
    deadline: StdInstant,
) -> Result<Vec<RepoRef>, DiscoveryError> {
    let mut repos = Vec::new();
    let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        check_deadline(root, deadline)?;

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(DiscoveryError::Unreadable {
                    path: root.to_path_buf(),
                    source: e.into(),
                });
            }
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            if entry.depth() == 0 {
                return Err(not_a_directory(root));
            }
            continue;
        }

        if entry.file_name() == GIT_DIR {
            walker.skip_current_dir();
            continue;
        }

        if is_repo_root(entry.path()) {
            repos.push(RepoRef::new(root, entry.path()));
            walker.skip_current_dir();
        }
    }

    Ok(repos)
}

/// Looks only at the immediate children of `root`.
pub fn find_repos_shallow(
    root: &Path,
    deadline: StdInstant,
) -> Result<Vec<RepoRef>, DiscoveryError> {
    let read_dir = std::fs::read_dir(root).map_err(|source| DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut children: Vec<PathBuf> = read_dir
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {}: {}", root.display(), e);
                None
            }
        })
        .collect();
    children.sort();

    let mut repos = Vec::new();
    for child in children {
        check_deadline(root, deadline)?;
        if child.is_dir() && is_repo_root(&child) {
            repos.push(RepoRef::new(root, child));
        }
    }

    Ok(repos)
}

fn check_deadline(root: &Path, deadline: StdInstant) -> Result<(), DiscoveryError> {
    if StdInstant::now() >= deadline {
        return Err(DiscoveryError::TimedOut {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

fn not_a_directory(root: &Path) -> DiscoveryError {
    DiscoveryError::Unreadable {
        path: root.to_path_buf(),
        source: io::Error::other("not a directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn later() -> StdInstant {
        StdInstant::now() + Duration::from_secs(10)
    }

    fn make_repo(root: &Path, rel: &str) {
        fs::create_dir_all(root.join(rel).join(GIT_DIR)).unwrap();
    }

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        make_repo(root, "beta");
        make_repo(root, "alpha");
        make_repo(root, "beta/vendor/nested");
        make_repo(root, "group/gamma");
        fs::create_dir_all(root.join("plain/src")).unwrap();
        fs::write(root.join("README.md"), "not a repo\n").unwrap();
        dir
    }

    fn names(repos: &[RepoRef]) -> Vec<&str> {
        repos.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn recursive_walk_stops_at_repository_roots() {
        let dir = workspace();
        let repos = find_repos_recursive(dir.path(), later()).unwrap();

        assert_eq!(names(&repos), ["alpha", "beta", "group/gamma"]);
        assert_eq!(repos[2].path, dir.path().join("group/gamma"));
    }

    #[test]
    fn shallow_scan_ignores_grandchildren() {
        let dir = workspace();
        let repos = find_repos_shallow(dir.path(), later()).unwrap();

        assert_eq!(names(&repos), ["alpha", "beta"]);
    }

    #[test]
    fn workspace_that_is_a_repository_is_reported_once() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("mono");
        make_repo(&root, "");
        make_repo(&root, "packages/inner");

        let repos = find_repos_recursive(&root, later()).unwrap();
        assert_eq!(names(&repos), ["mono"]);
        assert_eq!(repos[0].path, root);
    }

    #[test]
    fn empty_workspace_has_no_repositories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();

        assert!(find_repos_recursive(dir.path(), later()).unwrap().is_empty());
        assert!(find_repos_shallow(dir.path(), later()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        let err = find_repos_recursive(&missing, later()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreadable { .. }));

        let err = find_repos_shallow(&missing, later()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreadable { .. }));
    }

    #[test]
    fn file_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        let err = find_repos_recursive(&file, later()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreadable { .. }));
    }

    #[test]
    fn expired_deadline_stops_the_walk() {
        let dir = workspace();
        let err = find_repos_recursive(dir.path(), StdInstant::now()).unwrap_err();
        assert!(matches!(err, DiscoveryError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn discover_applies_the_configured_policy() {
        let dir = workspace();
        let deadline = Instant::now() + Duration::from_secs(10);

        let recursive = discover(dir.path(), DiscoveryPolicy::Recursive, deadline)
            .await
            .unwrap();
        let shallow = discover(dir.path(), DiscoveryPolicy::Shallow, deadline)
            .await
            .unwrap();

        assert_eq!(recursive.len(), 3);
        assert_eq!(shallow.len(), 2);
    }
}
