//! `gitdm publish|update|verify`: run one flow in-process.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use gitdm_daemon::{Config, FlowRunner, LiveRunner};
use gitdm_sync::{Flow, RunOutcome};

/// One-shot flows, equivalent to hitting the matching trigger route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCommand {
    Publish,
    Update,
    Verify { number: u64 },
}

impl From<FlowCommand> for Flow {
    fn from(command: FlowCommand) -> Self {
        match command {
            FlowCommand::Publish => Flow::PublishFromService,
            FlowCommand::Update => Flow::NormalizeAndUpdate,
            FlowCommand::Verify { number } => Flow::VerifyChange { number },
        }
    }
}

pub fn run(command: FlowCommand) -> Result<()> {
    gitdm_daemon::init_tracing();
    let config = Config::from_env().context("invalid sync configuration")?;
    let flow = Flow::from(command);

    let runner = LiveRunner::new(Arc::new(config));
    let outcome = runner.run(flow).with_context(|| format!("{flow} failed"))?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    let mut notes = vec![format!("{} page(s)", outcome.pages)];
    if outcome.pages_changed > 0 {
        notes.push(format!("{} changed", outcome.pages_changed));
    }
    if outcome.committed {
        notes.push("committed".to_string());
    }
    if let Some(batch) = &outcome.batch {
        notes.push(format!("+{} -{}", batch.additions, batch.removals));
    }
    if outcome.suppressed {
        notes.push("suppressed by marker".to_string());
    }

    println!("{}", outcome.token());
    eprintln!("{} {} ({})", "✓".green(), outcome.flow, notes.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_flows() {
        assert_eq!(Flow::from(FlowCommand::Publish), Flow::PublishFromService);
        assert_eq!(Flow::from(FlowCommand::Update), Flow::NormalizeAndUpdate);
        assert_eq!(
            Flow::from(FlowCommand::Verify { number: 9 }),
            Flow::VerifyChange { number: 9 }
        );
    }
}
