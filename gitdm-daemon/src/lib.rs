//! HTTP trigger server: configuration, routes, run summaries and shutdown.

pub mod config;
mod error;
pub mod runner;
mod server;
pub mod summary;

pub use config::Config;
pub use error::DaemonError;
pub use runner::{FlowRunner, LiveRunner};
pub use server::{
    init_tracing, parse_change_path, router, run, serve, shutdown_signal, start_blocking, AppState,
};
pub use summary::{HealthPayload, RunSummary};
