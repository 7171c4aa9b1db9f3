//! gitdm: affiliation profile sync between a git repository and the data service.
//!
//! # Usage
//!
//! ```text
//! gitdm serve
//! gitdm publish
//! gitdm update
//! gitdm verify <number>
//! gitdm check <dir> [--json]
//! gitdm normalize <dir> [--dry-run]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, flow::FlowCommand, normalize::NormalizeArgs, serve::ServeArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "gitdm",
    version,
    about = "Keep affiliation profile pages and the affiliation service in sync",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP trigger server (configured from the environment).
    Serve(ServeArgs),

    /// Publish the service's profiles to the repository.
    Publish,

    /// Normalize the repository pages and push their delta to the service.
    Update,

    /// Check that the pages of an unmerged change decode.
    Verify {
        /// Change (pull request) number.
        number: u64,
    },

    /// Decode every page in a local directory and summarize it.
    Check(CheckArgs),

    /// Canonicalize and rewrite a local page directory.
    Normalize(NormalizeArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Publish => commands::flow::run(FlowCommand::Publish),
        Commands::Update => commands::flow::run(FlowCommand::Update),
        Commands::Verify { number } => commands::flow::run(FlowCommand::Verify { number }),
        Commands::Check(args) => args.run(),
        Commands::Normalize(args) => args.run(),
    }
}
