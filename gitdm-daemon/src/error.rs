use std::path::PathBuf;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Error surface for configuration, the trigger server and runs it starts.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    MissingConfig(Vec<&'static str>),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] gitdm_sync::SyncError),

    #[error("malformed trigger: {0}")]
    MalformedTrigger(String),

    #[error("daemon protocol error: {0}")]
    Protocol(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

/// `2024-01-02 03:04:05.678`, local time.
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl IntoResponse for DaemonError {
    /// Every failure is `400 Bad Request` with `<timestamp>: <error>\n`.
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "trigger failed");
        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}: {self}\n", timestamp()),
        )
            .into_response()
    }
}
