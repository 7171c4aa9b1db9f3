//! Run summaries and the `/health` payload.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gitdm_sync::{Flow, RunOutcome};

/// Flow name as shown in summaries.
pub fn flow_label(flow: Flow) -> String {
    match flow {
        Flow::PublishFromService => "publish".to_string(),
        Flow::NormalizeAndUpdate => "update".to_string(),
        Flow::VerifyChange { number } => format!("verify:{number}"),
    }
}

/// Result of the most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub flow: String,
    pub ok: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub pages: usize,
    pub pages_changed: usize,
    pub committed: bool,
    pub additions: usize,
    pub removals: usize,
    pub suppressed: bool,
}

impl RunSummary {
    pub fn success(
        flow: Flow,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        outcome: &RunOutcome,
    ) -> Self {
        let (additions, removals) = outcome
            .batch
            .as_ref()
            .map_or((0, 0), |b| (b.additions, b.removals));
        Self {
            flow: flow_label(flow),
            ok: true,
            started_at,
            duration_ms,
            token: Some(outcome.token().to_string()),
            error: None,
            pages: outcome.pages,
            pages_changed: outcome.pages_changed,
            committed: outcome.committed,
            additions,
            removals,
            suppressed: outcome.suppressed,
        }
    }

    pub fn failure(flow: Flow, started_at: DateTime<Utc>, duration_ms: u64, error: String) -> Self {
        Self {
            flow: flow_label(flow),
            ok: false,
            started_at,
            duration_ms,
            token: None,
            error: Some(error),
            pages: 0,
            pages_changed: 0,
            committed: false,
            additions: 0,
            removals: 0,
            suppressed: false,
        }
    }
}

/// `GET /health` response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthPayload {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub runs: u64,
    pub last_run: Option<RunSummary>,
}

impl HealthPayload {
    pub fn new(started_at: DateTime<Utc>, runs: u64, last_run: Option<RunSummary>) -> Self {
        Self {
            status: "ok",
            service: "gitdm-sync",
            version: env!("CARGO_PKG_VERSION"),
            started_at,
            uptime_secs: (Utc::now() - started_at).num_seconds().max(0),
            runs,
            last_run,
        }
    }
}
