//! Runs flows against the configured repository and service.

use std::sync::Arc;

use gitdm_sync::{pipeline, Flow, RunOutcome, SingleFlight, SyncError};

use crate::config::Config;

/// Executes one flow to completion on the calling thread.
pub trait FlowRunner: Send + Sync + 'static {
    fn run(&self, flow: Flow) -> Result<RunOutcome, SyncError>;
}

/// [`FlowRunner`] backed by `git` and the HTTP affiliation service.
///
/// All clones share one gate, so runs never overlap.
#[derive(Debug, Clone)]
pub struct LiveRunner {
    config: Arc<Config>,
    gate: Arc<SingleFlight>,
}

impl LiveRunner {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            gate: Arc::new(SingleFlight::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl FlowRunner for LiveRunner {
    fn run(&self, flow: Flow) -> Result<RunOutcome, SyncError> {
        let repo = self.config.repository();
        let service = self.config.service();
        pipeline::run(
            &self.gate,
            flow,
            &repo,
            &service,
            &self.config.sync_settings(),
        )
    }
}
