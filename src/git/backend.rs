//! Access to repositories through git.
//!
//! `GitBackend` is the capability the diff strategy is written against; it can
//! be swapped for a fake in tests. `GitCli` is the real implementation:
//! - branch probes read the repository with libgit2 on the blocking pool
//! - diffs and the untracked listing run the `git` executable, streaming its
//!   stdout into the caller's writer and sending stderr to the log
//!
//! Every call is bounded by the request deadline. Child processes are killed
//! when the deadline fires or when the writer stops accepting bytes.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use git2::{ErrorCode, Repository};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::process::Command;
use tokio::time::Instant;

use crate::error::DiffError;
use crate::models::DiffTarget;

/// Destination for streamed diff bytes.
pub type DiffOutput<'a> = dyn AsyncWrite + Unpin + Send + 'a;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Commit id `rev` resolves to, or `None` if it does not exist.
    async fn resolve(
        &self,
        repo: &Path,
        rev: &str,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError>;

    /// Short name of the checked-out branch; `None` when HEAD is detached.
    async fn current_branch(
        &self,
        repo: &Path,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError>;

    /// Best common ancestor of two revisions, if they share history.
    async fn merge_base(
        &self,
        repo: &Path,
        a: &str,
        b: &str,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError>;

    /// Files that are neither tracked nor ignored, relative to `repo`.
    async fn untracked_files(
        &self,
        repo: &Path,
        deadline: Instant,
    ) -> Result<Vec<PathBuf>, DiffError>;

    /// Streams one diff phase into `out`, with `a/<prefix>/` and `b/<prefix>/`
    /// path markers.
    async fn diff(
        &self,
        repo: &Path,
        target: &DiffTarget,
        prefix: &str,
        out: &mut DiffOutput<'_>,
        deadline: Instant,
    ) -> Result<(), DiffError>;
}

/// `GitBackend` backed by libgit2 probes and the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `f` against the repository at `repo` without blocking the runtime.
    async fn probe<T, F>(&self, repo: &Path, deadline: Instant, f: F) -> Result<T, DiffError>
    where
        F: FnOnce(&Repository) -> Result<T, git2::Error> + Send + 'static,
        T: Send + 'static,
    {
        let path = repo.to_path_buf();
        let task = tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&path)?;
            f(&repo)
        });

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join_err)) => Err(DiffError::Probe(join_err.to_string())),
            Err(_) => Err(DiffError::DeadlineExceeded),
        }
    }

    /// Runs git in `repo`, copying stdout into `out`.
    ///
    /// Exit codes in `ok_codes` count as success besides 0.
    async fn run<I, S>(
        &self,
        repo: &Path,
        args: I,
        ok_codes: &[i32],
        out: &mut DiffOutput<'_>,
        deadline: Instant,
    ) -> Result<(), DiffError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let command = describe(&self.program, &args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(repo)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DiffError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DiffError::Io(io::Error::other("git stdout was not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DiffError::Io(io::Error::other("git stderr was not captured")))?;

        let execution = async {
            let (_, diagnostics) = tokio::try_join!(
                async {
                    tokio::io::copy(&mut stdout, &mut *out)
                        .await
                        .map_err(DiffError::from_sink)
                },
                read_diagnostics(&mut stderr),
            )?;
            let status = child.wait().await?;
            Ok::<_, DiffError>((status, diagnostics))
        };
        let outcome = tokio::time::timeout_at(deadline, execution).await;

        let (status, diagnostics) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                let _ = child.start_kill();
                return Err(e);
            }
            Err(_) => {
                let _ = child.start_kill();
                tracing::debug!("Killed `{}` at the request deadline", command);
                return Err(DiffError::DeadlineExceeded);
            }
        };

        let diagnostics = String::from_utf8_lossy(&diagnostics).trim().to_string();
        let accepted = status.success() || status.code().is_some_and(|c| ok_codes.contains(&c));
        if !accepted {
            return Err(DiffError::CommandFailed {
                command,
                status: status.to_string(),
                stderr: diagnostics,
            });
        }

        if !diagnostics.is_empty() {
            tracing::debug!("`{}` in {}: {}", command, repo.display(), diagnostics);
        }
        Ok(())
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn resolve(
        &self,
        repo: &Path,
        rev: &str,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        let rev = rev.to_string();
        self.probe(repo, deadline, move |repo| {
            match repo.revparse_single(&rev).and_then(|obj| obj.peel_to_commit()) {
                Ok(commit) => Ok(Some(commit.id().to_string())),
                Err(e) if is_missing(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn current_branch(
        &self,
        repo: &Path,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        // Read HEAD symbolically so an unborn branch still reports its name.
        self.probe(repo, deadline, |repo| {
            let head = repo.find_reference("HEAD")?;
            Ok(head
                .symbolic_target()
                .and_then(|target| target.strip_prefix("refs/heads/"))
                .map(|name| name.to_string()))
        })
        .await
    }

    async fn merge_base(
        &self,
        repo: &Path,
        a: &str,
        b: &str,
        deadline: Instant,
    ) -> Result<Option<String>, DiffError> {
        let (a, b) = (a.to_string(), b.to_string());
        self.probe(repo, deadline, move |repo| {
            let a = repo.revparse_single(&a)?.peel_to_commit()?.id();
            let b = repo.revparse_single(&b)?.peel_to_commit()?.id();
            match repo.merge_base(a, b) {
                Ok(oid) => Ok(Some(oid.to_string())),
                Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn untracked_files(
        &self,
        repo: &Path,
        deadline: Instant,
    ) -> Result<Vec<PathBuf>, DiffError> {
        let mut listing = Vec::new();
        self.run(
            repo,
            ["ls-files", "--others", "--exclude-standard", "-z"],
            &[],
            &mut listing,
            deadline,
        )
        .await?;

        Ok(listing
            .split(|b| *b == 0)
            .filter(|entry| !entry.is_empty())
            .map(path_from_bytes)
            .collect())
    }

    async fn diff(
        &self,
        repo: &Path,
        target: &DiffTarget,
        prefix: &str,
        out: &mut DiffOutput<'_>,
        deadline: Instant,
    ) -> Result<(), DiffError> {
        let mut args: Vec<OsString> = vec![
            "diff".into(),
            "--no-color".into(),
            "--no-ext-diff".into(),
            format!("--src-prefix=a/{}/", prefix).into(),
            format!("--dst-prefix=b/{}/", prefix).into(),
        ];

        match target {
            DiffTarget::Tracked { base } => {
                args.push(base.into());
                args.push("--".into());
                self.run(repo, args, &[], out, deadline).await
            }
            DiffTarget::Untracked { path } => {
                // --no-index exits 1 whenever the inputs differ.
                args.insert(1, "--no-index".into());
                args.push("--".into());
                args.push(NULL_DEVICE.into());
                args.push(path.into());
                self.run(repo, args, &[1], out, deadline).await
            }
        }
    }
}

async fn read_diagnostics<R: AsyncRead + Unpin>(stderr: &mut R) -> Result<Vec<u8>, DiffError> {
    let mut buf = Vec::new();
    stderr.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Paths from `ls-files -z` are raw bytes; keep them intact where the OS allows.
#[cfg(unix)]
fn path_from_bytes(entry: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(entry))
}

#[cfg(not(unix))]
fn path_from_bytes(entry: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(entry).into_owned())
}

fn is_missing(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::NotFound | ErrorCode::UnbornBranch | ErrorCode::InvalidSpec | ErrorCode::Ambiguous
    )
}

fn describe(program: &Path, args: &[OsString]) -> String {
    let mut command = program.display().to_string();
    for arg in args {
        command.push(' ');
        command.push_str(&arg.to_string_lossy());
    }
    command
}
