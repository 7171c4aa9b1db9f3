//! Repository access.
//!
//! [`Repository`] is the set of version-control operations a run needs;
//! [`GitCli`] implements it by shelling out to `git` against one working copy.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::RepoError;

/// Pathspec covering every page file.
pub const PAGE_PATHSPEC: &str = "profiles*.yaml";

// ---------------------------------------------------------------------------
// Repository trait
// ---------------------------------------------------------------------------

/// Page files that differ from the last commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoStatus {
    pub changed: Vec<String>,
}

impl RepoStatus {
    pub fn is_clean(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Version-control operations against a single working copy.
pub trait Repository {
    /// Directory holding the working copy.
    fn workdir(&self) -> &Path;

    /// Delete the working copy. Succeeds if there is none.
    fn discard(&self) -> Result<(), RepoError>;

    /// Replace the working copy with a fresh checkout of the remote default branch.
    fn fresh_checkout(&self) -> Result<(), RepoError>;

    /// Page files changed, added or deleted relative to `HEAD`.
    fn status(&self) -> Result<RepoStatus, RepoError>;

    /// Stage every page change, deletions included.
    fn stage(&self) -> Result<(), RepoError>;

    /// Commit staged changes with sign-off.
    fn commit(&self, message: &str) -> Result<(), RepoError>;

    /// Push the current branch to the remote.
    fn push(&self) -> Result<(), RepoError>;

    /// Fetch unmerged change `number` into branch `gitdm-sync-<number>`.
    fn fetch_ref(&self, number: u64) -> Result<(), RepoError>;

    /// Check out the branch created by [`Repository::fetch_ref`].
    fn checkout_ref(&self, number: u64) -> Result<(), RepoError>;

    fn last_commit_message(&self) -> Result<String, RepoError>;

    /// Set the local commit identity unless one is already configured.
    fn ensure_identity(&self, name: &str, email: &str) -> Result<(), RepoError>;
}

/// Local branch name an unmerged change is fetched into.
pub fn change_branch(number: u64) -> String {
    format!("gitdm-sync-{number}")
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Remote repository location plus push credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    /// Host base such as `https://github.com`, or a local directory.
    pub base: String,
    /// `<owner>/<repo>`
    pub slug: String,
    pub user: String,
    pub token: String,
}

impl RemoteSpec {
    pub fn new(
        base: impl Into<String>,
        slug: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            slug: slug.into(),
            user: user.into(),
            token: token.into(),
        }
    }

    /// Remote URL without credentials.
    pub fn plain_url(&self) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), self.slug)
    }

    /// Remote URL with `user:token@` inserted after an http(s) scheme.
    ///
    /// Other remotes (local paths, ssh) are returned unchanged.
    pub fn authenticated_url(&self) -> String {
        let plain = self.plain_url();
        for scheme in ["https://", "http://"] {
            if let Some(rest) = plain.strip_prefix(scheme) {
                return format!("{scheme}{}:{}@{rest}", self.user, self.token);
            }
        }
        plain
    }

    /// Replace every occurrence of the token in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            return text.to_string();
        }
        text.replace(&self.token, "***")
    }
}

impl fmt::Debug for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSpec")
            .field("base", &self.base)
            .field("slug", &self.slug)
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`Repository`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    remote: RemoteSpec,
}

struct GitOutput {
    code: i32,
    stdout: String,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>, remote: RemoteSpec) -> Self {
        Self {
            workdir: workdir.into(),
            remote,
        }
    }

    pub fn remote(&self) -> &RemoteSpec {
        &self.remote
    }

    /// Run `git -C <workdir> <args>`; exit codes other than 0 and
    /// `allowed_exit_codes` are errors.
    fn run_git(&self, args: &[&str], allowed_exit_codes: &[i32]) -> Result<GitOutput, RepoError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.workdir).args(args);
        self.run(cmd, args, allowed_exit_codes)
    }

    fn run(&self, mut cmd: Command, args: &[&str], allowed_exit_codes: &[i32]) -> Result<GitOutput, RepoError> {
        let command = self.remote.redact(&format!("git {}", args.join(" ")));
        tracing::info!("{command}");

        let output = cmd
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|source| RepoError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let code = output.status.code();
        match code {
            Some(code) if code == 0 || allowed_exit_codes.contains(&code) => {
                tracing::debug!("`{command}` exited with {code}");
                Ok(GitOutput { code, stdout })
            }
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(RepoError::CommandFailed {
                    code: code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    command,
                    stdout: self.remote.redact(&stdout),
                    stderr: self.remote.redact(&stderr),
                })
            }
        }
    }

    fn config_value(&self, key: &str) -> Result<Option<String>, RepoError> {
        let out = self.run_git(&["config", "--get", key], &[1])?;
        let value = out.stdout.trim();
        if out.code != 0 || value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }
}

impl Repository for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn discard(&self) -> Result<(), RepoError> {
        match std::fs::remove_dir_all(&self.workdir) {
            Ok(()) => {
                tracing::debug!("discarded working copy {}", self.workdir.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RepoError::Io {
                path: self.workdir.clone(),
                source,
            }),
        }
    }

    fn fresh_checkout(&self) -> Result<(), RepoError> {
        self.discard()?;
        if let Some(parent) = self.workdir.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RepoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let url = self.remote.authenticated_url();
        let workdir = self.workdir.to_string_lossy();
        let args = ["clone", "--quiet", url.as_str(), workdir.as_ref()];
        let mut cmd = Command::new("git");
        cmd.args(args);
        self.run(cmd, &args, &[])?;
        Ok(())
    }

    fn status(&self) -> Result<RepoStatus, RepoError> {
        let out = self.run_git(&["status", "--porcelain", "--", PAGE_PATHSPEC], &[])?;
        let changed = out
            .stdout
            .lines()
            .filter_map(|line| line.get(3..))
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .collect();
        Ok(RepoStatus { changed })
    }

    fn stage(&self) -> Result<(), RepoError> {
        self.run_git(&["add", "--all", "--", PAGE_PATHSPEC], &[])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), RepoError> {
        self.run_git(&["commit", "--signoff", "--quiet", "-m", message], &[])?;
        Ok(())
    }

    fn push(&self) -> Result<(), RepoError> {
        let url = self.remote.authenticated_url();
        self.run_git(&["push", "--quiet", url.as_str(), "HEAD"], &[])?;
        Ok(())
    }

    fn fetch_ref(&self, number: u64) -> Result<(), RepoError> {
        let refspec = format!("pull/{number}/head:{}", change_branch(number));
        self.run_git(&["fetch", "--quiet", "origin", refspec.as_str()], &[])?;
        Ok(())
    }

    fn checkout_ref(&self, number: u64) -> Result<(), RepoError> {
        let branch = change_branch(number);
        self.run_git(&["checkout", "--quiet", branch.as_str()], &[])?;
        Ok(())
    }

    fn last_commit_message(&self) -> Result<String, RepoError> {
        let out = self.run_git(&["log", "-1", "--pretty=%B"], &[])?;
        Ok(out.stdout.trim().to_string())
    }

    fn ensure_identity(&self, name: &str, email: &str) -> Result<(), RepoError> {
        for (key, value) in [("user.name", name), ("user.email", email)] {
            if self.config_value(key)?.is_none() {
                self.run_git(&["config", key, value], &[])?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
