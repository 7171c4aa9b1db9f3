//! Sync orchestration shared by the daemon and the CLI.
//!
//! A run walks `Idle → Acquiring → Preparing → Loading → Canonicalizing →
//! Computing → Publishing → Cleanup → Idle`. Any failure jumps straight to
//! `Cleanup`. The working copy is discarded before the run starts and again
//! on every exit path, unwinding included.

use std::fmt;

use chrono::{DateTime, Local};

use gitdm_core::{canonicalize_all, pages, MAX_PAGE_BYTES};

use crate::{
    client::AffiliationService,
    diff::ProfileDiff,
    gate::{RunPermit, SingleFlight},
    repo::Repository,
    writer::{write_pages, PageWriteReport},
    SyncError,
};

/// Commit-message token that stops the push webhook from re-running the
/// normalize flow on the service's own commits.
pub const NO_CALLBACK_MARKER: &str = "[no-callback]";

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Service → pages → commit and push.
    PublishFromService,
    /// Pages → canonical pages → bulk update to the service.
    NormalizeAndUpdate,
    /// Decode every page of unmerged change `number`.
    VerifyChange { number: u64 },
}

impl Flow {
    pub fn success_token(&self) -> &'static str {
        match self {
            Flow::PublishFromService => "SYNC_DB_OK",
            Flow::NormalizeAndUpdate => "SYNC_OK",
            Flow::VerifyChange { .. } => "CHECK_OK",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::PublishFromService => f.write_str("sync from DB"),
            Flow::NormalizeAndUpdate => f.write_str("sync repo"),
            Flow::VerifyChange { number } => write!(f, "check change {number}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Run state + context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Acquiring,
    Preparing,
    Loading,
    Canonicalizing,
    Computing,
    Publishing,
    Cleanup,
}

/// Per-run context: the gate permit plus every state the run passed through.
#[derive(Debug)]
pub struct RunContext<'g> {
    _permit: RunPermit<'g>,
    states: Vec<RunState>,
}

impl<'g> RunContext<'g> {
    /// Block on `gate`, then start a run.
    pub fn acquire(gate: &'g SingleFlight) -> Self {
        let permit = gate.acquire();
        Self {
            _permit: permit,
            states: vec![RunState::Idle, RunState::Acquiring],
        }
    }

    fn enter(&mut self, state: RunState) {
        tracing::debug!("run state: {state:?}");
        self.states.push(state);
    }

    pub fn states(&self) -> &[RunState] {
        &self.states
    }
}

// ---------------------------------------------------------------------------
// Settings + outcome
// ---------------------------------------------------------------------------

/// Commit identity and tuning for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub author_name: String,
    pub author_email: String,
    /// Leading word of generated commit messages (the push user).
    pub commit_label: String,
    /// Stop the normalize flow when the last commit carries the marker.
    pub check_marker: bool,
    pub page_cap: usize,
}

impl SyncSettings {
    pub fn new(
        author_name: impl Into<String>,
        author_email: impl Into<String>,
        commit_label: impl Into<String>,
    ) -> Self {
        Self {
            author_name: author_name.into(),
            author_email: author_email.into(),
            commit_label: commit_label.into(),
            check_marker: true,
            page_cap: MAX_PAGE_BYTES,
        }
    }
}

/// Bulk update that was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub additions: usize,
    pub removals: usize,
    /// Status text the service answered with.
    pub status: String,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub flow: Flow,
    /// Page count after the run (or pages decoded, for verify).
    pub pages: usize,
    /// Page files written or removed.
    pub pages_changed: usize,
    pub committed: bool,
    pub batch: Option<BatchSummary>,
    /// Normalize flow stopped at the marker check.
    pub suppressed: bool,
    pub states: Vec<RunState>,
}

impl RunOutcome {
    fn new(flow: Flow) -> Self {
        Self {
            flow,
            pages: 0,
            pages_changed: 0,
            committed: false,
            batch: None,
            suppressed: false,
            states: Vec::new(),
        }
    }

    fn record_pages(&mut self, report: &PageWriteReport) {
        self.pages = report.pages;
        self.pages_changed = report.written() + report.removed();
    }

    pub fn token(&self) -> &'static str {
        self.flow.success_token()
    }
}

/// `<label> gitdm-sync @ <YYYY-MM-DD HH:MM:SS> [no-callback]`
pub fn commit_message(label: &str, at: DateTime<Local>) -> String {
    format!(
        "{label} gitdm-sync @ {} {NO_CALLBACK_MARKER}",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Acquire `gate` and run `flow`.
///
/// This is the sync entrypoint for both the HTTP triggers and the CLI.
pub fn run<R, S>(
    gate: &SingleFlight,
    flow: Flow,
    repo: &R,
    service: &S,
    settings: &SyncSettings,
) -> Result<RunOutcome, SyncError>
where
    R: Repository + ?Sized,
    S: AffiliationService + ?Sized,
{
    tracing::info!("{flow}: waiting for gate");
    let mut ctx = RunContext::acquire(gate);
    run_with(&mut ctx, flow, repo, service, settings)
}

/// Run `flow` under an already acquired context.
pub fn run_with<R, S>(
    ctx: &mut RunContext<'_>,
    flow: Flow,
    repo: &R,
    service: &S,
    settings: &SyncSettings,
) -> Result<RunOutcome, SyncError>
where
    R: Repository + ?Sized,
    S: AffiliationService + ?Sized,
{
    tracing::info!("{flow}: start");
    let cleanup = DiscardOnDrop { repo };
    let result = match flow {
        Flow::PublishFromService => publish_from_service(ctx, repo, service, settings),
        Flow::NormalizeAndUpdate => normalize_and_update(ctx, repo, service, settings),
        Flow::VerifyChange { number } => verify_change(ctx, repo, number),
    };
    ctx.enter(RunState::Cleanup);
    drop(cleanup);
    ctx.enter(RunState::Idle);

    match result {
        Ok(mut outcome) => {
            outcome.states = ctx.states().to_vec();
            tracing::info!("{flow}: finished ({})", outcome.token());
            Ok(outcome)
        }
        Err(err) => {
            tracing::error!("{flow}: failed: {err}");
            Err(err)
        }
    }
}

/// Discards the working copy when dropped, including during unwinding.
struct DiscardOnDrop<'r, R: Repository + ?Sized> {
    repo: &'r R,
}

impl<R: Repository + ?Sized> Drop for DiscardOnDrop<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.repo.discard() {
            tracing::warn!("failed to discard working copy: {err}");
        }
    }
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

fn publish_from_service<R, S>(
    ctx: &mut RunContext<'_>,
    repo: &R,
    service: &S,
    settings: &SyncSettings,
) -> Result<RunOutcome, SyncError>
where
    R: Repository + ?Sized,
    S: AffiliationService + ?Sized,
{
    let mut outcome = RunOutcome::new(Flow::PublishFromService);

    ctx.enter(RunState::Preparing);
    repo.fresh_checkout()?;

    ctx.enter(RunState::Loading);
    let mut profiles = service.fetch_all()?;

    ctx.enter(RunState::Canonicalizing);
    canonicalize_all(&mut profiles);

    ctx.enter(RunState::Computing);
    let report = write_pages(repo.workdir(), &profiles, settings.page_cap)?;
    outcome.record_pages(&report);

    ctx.enter(RunState::Publishing);
    outcome.committed = commit_pages_if_changed(repo, settings)?;
    Ok(outcome)
}

fn normalize_and_update<R, S>(
    ctx: &mut RunContext<'_>,
    repo: &R,
    service: &S,
    settings: &SyncSettings,
) -> Result<RunOutcome, SyncError>
where
    R: Repository + ?Sized,
    S: AffiliationService + ?Sized,
{
    let mut outcome = RunOutcome::new(Flow::NormalizeAndUpdate);

    ctx.enter(RunState::Preparing);
    repo.fresh_checkout()?;

    ctx.enter(RunState::Loading);
    let mut candidate = pages::read_profiles_at(repo.workdir())?;
    tracing::info!("read {} profile(s) from pages", candidate.len());
    let suppressed = if settings.check_marker {
        repo.last_commit_message()?.contains(NO_CALLBACK_MARKER)
    } else {
        tracing::info!("marker check disabled");
        false
    };
    // `None` stops the run once the pages are rewritten.
    let current = if suppressed {
        tracing::info!("last commit carries {NO_CALLBACK_MARKER}; not contacting the service");
        None
    } else {
        Some(service.fetch_all()?)
    };

    ctx.enter(RunState::Canonicalizing);
    canonicalize_all(&mut candidate);

    ctx.enter(RunState::Computing);
    let report = write_pages(repo.workdir(), &candidate, settings.page_cap)?;
    outcome.record_pages(&report);
    let Some(current) = current else {
        outcome.suppressed = true;
        return Ok(outcome);
    };
    let diff = ProfileDiff::compute(&candidate, &current);

    ctx.enter(RunState::Publishing);
    outcome.committed = commit_pages_if_changed(repo, settings)?;
    if diff.is_empty() {
        tracing::info!("service already matches pages");
        return Ok(outcome);
    }
    let (additions, removals) = (diff.additions.len(), diff.removals.len());
    let status = service.bulk_update(&diff.into_update())?;
    outcome.batch = Some(BatchSummary {
        additions,
        removals,
        status,
    });
    Ok(outcome)
}

fn verify_change<R>(ctx: &mut RunContext<'_>, repo: &R, number: u64) -> Result<RunOutcome, SyncError>
where
    R: Repository + ?Sized,
{
    let mut outcome = RunOutcome::new(Flow::VerifyChange { number });

    ctx.enter(RunState::Preparing);
    repo.fresh_checkout()?;
    repo.fetch_ref(number)?;
    repo.checkout_ref(number)?;

    ctx.enter(RunState::Loading);
    let loaded = pages::read_pages_at(repo.workdir())?;
    outcome.pages = loaded.len();
    tracing::info!(
        "change {number}: {} page(s), {} profile(s) decoded",
        loaded.len(),
        loaded.iter().map(|p| p.profiles.len()).sum::<usize>()
    );
    Ok(outcome)
}

/// Stage, commit and push page changes. Returns `false` when there were none.
fn commit_pages_if_changed<R>(repo: &R, settings: &SyncSettings) -> Result<bool, SyncError>
where
    R: Repository + ?Sized,
{
    let status = repo.status()?;
    if status.is_clean() {
        tracing::info!("pages don't need updates");
        return Ok(false);
    }
    tracing::info!("{} page file(s) changed", status.changed.len());

    repo.ensure_identity(&settings.author_name, &settings.author_email)?;
    repo.stage()?;
    repo.commit(&commit_message(&settings.commit_label, Local::now()))?;
    repo.push()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tokens_per_flow() {
        assert_eq!(Flow::PublishFromService.success_token(), "SYNC_DB_OK");
        assert_eq!(Flow::NormalizeAndUpdate.success_token(), "SYNC_OK");
        assert_eq!(Flow::VerifyChange { number: 7 }.success_token(), "CHECK_OK");
    }

    #[test]
    fn commit_message_carries_label_time_and_marker() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 1).unwrap();
        assert_eq!(
            commit_message("bot", at),
            "bot gitdm-sync @ 2024-03-05 09:07:01 [no-callback]"
        );
    }

    #[test]
    fn context_records_acquire() {
        let gate = SingleFlight::new();
        let mut ctx = RunContext::acquire(&gate);
        ctx.enter(RunState::Preparing);
        assert_eq!(
            ctx.states(),
            &[RunState::Idle, RunState::Acquiring, RunState::Preparing]
        );
        assert!(gate.try_acquire().is_none(), "context must hold the gate");
    }

    #[test]
    fn settings_default_to_marker_check_and_max_page() {
        let s = SyncSettings::new("n", "e", "l");
        assert!(s.check_marker);
        assert_eq!(s.page_cap, MAX_PAGE_BYTES);
    }
}
