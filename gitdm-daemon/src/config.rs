//! Service configuration loaded from environment variables.

use std::fmt;
use std::path::PathBuf;

use gitdm_sync::{GitCli, HttpAffiliationService, RemoteSpec, SyncSettings};

use crate::error::DaemonError;

pub const DEFAULT_REMOTE_BASE: &str = "https://github.com";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7070";
pub const DEFAULT_WORKDIR: &str = "gitdm";

const REQUIRED: &[&str] = &[
    "DA_API_URL",
    "GITDM_GITHUB_REPO",
    "GITDM_GITHUB_USER",
    "GITDM_GITHUB_OAUTH",
    "GITDM_GIT_USER",
    "GITDM_GIT_EMAIL",
];

/// Validated configuration shared by every run.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Affiliation service base URL, no trailing `/`.
    pub api_url: String,
    /// `<owner>/<repo>`
    pub repo_slug: String,
    /// Push user; also the first word of generated commit messages.
    pub github_user: String,
    pub github_token: String,
    /// Commit author name.
    pub git_user: String,
    /// Commit author email.
    pub git_email: String,
    pub remote_base: String,
    pub bind_addr: String,
    /// Where runs clone the repository.
    pub workdir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Required:
    /// - `DA_API_URL`, `GITDM_GITHUB_REPO`, `GITDM_GITHUB_USER`,
    ///   `GITDM_GITHUB_OAUTH`, `GITDM_GIT_USER`, `GITDM_GIT_EMAIL`
    ///
    /// Optional:
    /// - `GITDM_REMOTE_BASE` (default: `https://github.com`)
    /// - `GITDM_BIND_ADDR` (default: `0.0.0.0:7070`)
    /// - `GITDM_WORKDIR` (default: `gitdm`)
    pub fn from_env() -> Result<Self, DaemonError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    ///
    /// Blank values count as missing. Every missing required variable is
    /// reported at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DaemonError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<&'static str> = REQUIRED
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DaemonError::MissingConfig(missing));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let config = Self {
            api_url: required("DA_API_URL").trim_end_matches('/').to_string(),
            repo_slug: required("GITDM_GITHUB_REPO"),
            github_user: required("GITDM_GITHUB_USER"),
            github_token: required("GITDM_GITHUB_OAUTH"),
            git_user: required("GITDM_GIT_USER"),
            git_email: required("GITDM_GIT_EMAIL"),
            remote_base: get("GITDM_REMOTE_BASE")
                .unwrap_or_else(|| DEFAULT_REMOTE_BASE.to_string()),
            bind_addr: get("GITDM_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            workdir: get("GITDM_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKDIR)),
        };

        tracing::info!(
            api_url = %config.api_url,
            repo = %config.repo_slug,
            remote_base = %config.remote_base,
            bind_addr = %config.bind_addr,
            workdir = %config.workdir.display(),
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn remote(&self) -> RemoteSpec {
        RemoteSpec::new(
            &self.remote_base,
            &self.repo_slug,
            &self.github_user,
            &self.github_token,
        )
    }

    pub fn repository(&self) -> GitCli {
        GitCli::new(self.workdir.clone(), self.remote())
    }

    pub fn service(&self) -> HttpAffiliationService {
        HttpAffiliationService::new(&self.api_url)
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings::new(&self.git_user, &self.git_email, &self.github_user)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("repo_slug", &self.repo_slug)
            .field("github_user", &self.github_user)
            .field("github_token", &"***")
            .field("git_user", &self.git_user)
            .field("git_email", &self.git_email)
            .field("remote_base", &self.remote_base)
            .field("bind_addr", &self.bind_addr)
            .field("workdir", &self.workdir)
            .finish()
    }
}
