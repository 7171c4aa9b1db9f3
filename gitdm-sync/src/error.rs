//! Error types for gitdm-sync.

use std::path::PathBuf;

use thiserror::Error;

use gitdm_core::ManifestError;

/// Failures reported by a [`crate::repo::Repository`].
#[derive(Debug, Error)]
pub enum RepoError {
    /// The command could not be started at all.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited with a status that is not allowed.
    #[error("`{command}` exited with {code}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    CommandFailed {
        command: String,
        code: String,
        stdout: String,
        stderr: String,
    },

    /// Filesystem failure while preparing or discarding the working copy.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures reported by an [`crate::client::AffiliationService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network-level failure; no HTTP status was received.
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    /// The service answered with a status other than 200.
    #[error("{method} {url} returned status {status}\n{body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected YAML document.
    #[error("{method} {url} returned an undecodable body: {source}\nbody: {body}")]
    Decode {
        method: &'static str,
        url: String,
        body: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The request payload could not be serialized.
    #[error("failed to encode request payload: {0}")]
    Encode(#[source] serde_yaml::Error),
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Page decode or render failure.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Version-control operation failure.
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    /// Affiliation service failure.
    #[error("affiliation service error: {0}")]
    Service(#[from] ServiceError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
