//! `gitdm serve`: run the trigger server in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use gitdm_daemon::Config;

/// Arguments for `gitdm serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address; overrides `GITDM_BIND_ADDR`.
    #[arg(long)]
    pub bind: Option<String>,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        gitdm_daemon::init_tracing();
        let mut config = Config::from_env().context("invalid server configuration")?;
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        gitdm_daemon::start_blocking(config).context("trigger server failed")
    }
}
