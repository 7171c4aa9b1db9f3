use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, Uri};
use axum::routing::{any, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::Level;

use gitdm_sync::{Flow, RunOutcome};

use crate::config::Config;
use crate::error::{io_err, DaemonError};
use crate::runner::{FlowRunner, LiveRunner};
use crate::summary::{HealthPayload, RunSummary};

/// State shared by every trigger handler.
#[derive(Clone)]
pub struct AppState {
    runner: Arc<dyn FlowRunner>,
    started_at: DateTime<Utc>,
    runs: Arc<AtomicU64>,
    last_run: Arc<RwLock<Option<RunSummary>>>,
}

impl AppState {
    pub fn new(runner: Arc<dyn FlowRunner>) -> Self {
        Self {
            runner,
            started_at: Utc::now(),
            runs: Arc::new(AtomicU64::new(0)),
            last_run: Arc::new(RwLock::new(None)),
        }
    }
}

/// Trigger routes.
///
/// - `/push` (any method): normalize pages and update the service
/// - `/sync-from-db` (any method): publish the service state to the repository
/// - `/pr/refs/pull/<number>/merge` (any method): verify an unmerged change
/// - `GET /health`: JSON status
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/push", any(push))
        .route("/sync-from-db", any(sync_from_db))
        .route("/pr/{*rest}", any(verify_change))
        .route("/health", get(health))
        .with_state(state)
}

async fn push(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<&'static str, DaemonError> {
    log_request(&method, &uri, &headers);
    trigger(state, Flow::NormalizeAndUpdate).await
}

async fn sync_from_db(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<&'static str, DaemonError> {
    log_request(&method, &uri, &headers);
    trigger(state, Flow::PublishFromService).await
}

async fn verify_change(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<&'static str, DaemonError> {
    log_request(&method, &uri, &headers);
    let number = parse_change_path(uri.path())?;
    trigger(state, Flow::VerifyChange { number }).await
}

async fn health(State(state): State<AppState>) -> Json<HealthPayload> {
    let last_run = state.last_run.read().await.clone();
    Json(HealthPayload::new(
        state.started_at,
        state.runs.load(Ordering::Relaxed),
        last_run,
    ))
}

fn log_request(method: &Method, uri: &Uri, headers: &HeaderMap) {
    let agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    tracing::info!(%method, path = %uri.path(), agent, "trigger received");
}

/// Change number from `/pr/refs/pull/<number>/merge`.
///
/// The path must have exactly six `/`-separated segments (counting the
/// leading empty one); the fifth is the number.
pub fn parse_change_path(path: &str) -> Result<u64, DaemonError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() != 6 {
        return Err(DaemonError::MalformedTrigger(format!("malformed path: {path}")));
    }
    segments[4].trim().parse().map_err(|err| {
        DaemonError::MalformedTrigger(format!("no change number in path {path}: {err}"))
    })
}

/// Run `flow` on a blocking worker and record its summary.
async fn trigger(state: AppState, flow: Flow) -> Result<&'static str, DaemonError> {
    let started_at = Utc::now();
    let clock = Instant::now();

    let runner = state.runner.clone();
    let joined = tokio::task::spawn_blocking(move || runner.run(flow)).await;
    let result: Result<RunOutcome, DaemonError> = match joined {
        Ok(inner) => inner.map_err(DaemonError::from),
        Err(err) => Err(DaemonError::Protocol(format!("{flow} run aborted: {err}"))),
    };

    let elapsed = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
    let summary = match &result {
        Ok(outcome) => RunSummary::success(flow, started_at, elapsed, outcome),
        Err(err) => RunSummary::failure(flow, started_at, elapsed, err.to_string()),
    };
    state.runs.fetch_add(1, Ordering::Relaxed);
    *state.last_run.write().await = Some(summary);

    result.map(|outcome| outcome.token())
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

/// Start the trigger server and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(Arc::new(config)))
}

/// Serve triggers with the live runner until a shutdown signal arrives.
pub async fn run(config: Arc<Config>) -> Result<(), DaemonError> {
    let runner: Arc<dyn FlowRunner> = Arc::new(LiveRunner::new(config.clone()));
    serve(&config.bind_addr, runner, shutdown_signal()).await
}

/// Serve triggers on `bind_addr` until `shutdown` resolves.
pub async fn serve(
    bind_addr: &str,
    runner: Arc<dyn FlowRunner>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DaemonError> {
    let app = router(AppState::new(runner)).layer(TraceLayer::new_for_http().make_span_with(
        |request: &Request<_>| {
            tracing::span!(
                Level::INFO,
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        },
    ));

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| io_err(bind_addr, e))?;
    tracing::info!(addr = %bind_addr, "starting sync server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| io_err(bind_addr, e))?;
    tracing::info!("sync server stopped");
    Ok(())
}

/// Resolves on ctrl-c, SIGUSR1 or SIGALRM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("ctrl-c handler failed: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let other = async {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::alarm()),
        ) {
            (Ok(mut usr1), Ok(mut alarm)) => {
                tokio::select! {
                    _ = usr1.recv() => tracing::info!("received SIGUSR1"),
                    _ = alarm.recv() => tracing::info!("received SIGALRM"),
                }
            }
            _ => {
                tracing::warn!("could not install SIGUSR1/SIGALRM handlers");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let other = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = other => tracing::info!("shutting down"),
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), JSON
/// lines when `GITDM_LOG_FORMAT=json`.
///
/// Records from the `log` facade used by the library crates are forwarded.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let json = std::env::var("GITDM_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_change_number() {
        assert_eq!(parse_change_path("/pr/refs/pull/42/merge").unwrap(), 42);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        for path in ["/pr/refs/pull/42", "/pr/refs/pull/42/merge/extra", "/pr/"] {
            let err = parse_change_path(path).unwrap_err();
            assert!(matches!(err, DaemonError::MalformedTrigger(_)), "{path}: {err}");
        }
    }

    #[test]
    fn rejects_non_numeric_change() {
        let err = parse_change_path("/pr/refs/pull/abc/merge").unwrap_err();
        assert!(err.to_string().contains("no change number"), "{err}");
        assert!(parse_change_path("/pr/refs/pull/-1/merge").is_err());
    }
}
