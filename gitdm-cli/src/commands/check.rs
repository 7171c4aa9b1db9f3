//! `gitdm check <dir>`: decode every page and summarize it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use gitdm_core::{pages::read_pages_at, EstimatedSize, MAX_PAGE_BYTES};

/// Arguments for `gitdm check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory holding `profiles1.yaml`, `profiles2.yaml`, ...
    pub dir: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
struct PageSummary {
    page: String,
    profiles: usize,
    bytes: usize,
    estimated: usize,
    oversized: bool,
}

#[derive(Tabled)]
struct PageRow {
    #[tabled(rename = "page")]
    page: String,
    #[tabled(rename = "profiles")]
    profiles: usize,
    #[tabled(rename = "bytes")]
    bytes: usize,
    #[tabled(rename = "estimated")]
    estimated: usize,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let pages = read_pages_at(&self.dir)
            .with_context(|| format!("check failed for {}", self.dir.display()))?;

        let summaries: Vec<PageSummary> = pages
            .iter()
            .map(|page| {
                let estimated = page.profiles.iter().map(EstimatedSize::estimated_size).sum();
                PageSummary {
                    page: page
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| page.number.to_string()),
                    profiles: page.profiles.len(),
                    bytes: page.bytes,
                    estimated,
                    oversized: page.bytes > MAX_PAGE_BYTES,
                }
            })
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }

        if summaries.is_empty() {
            println!("No profile pages in {}.", self.dir.display());
            return Ok(());
        }
        print_table(&summaries);
        Ok(())
    }
}

fn print_table(summaries: &[PageSummary]) {
    let rows: Vec<PageRow> = summaries
        .iter()
        .map(|s| PageRow {
            page: if s.oversized {
                s.page.yellow().to_string()
            } else {
                s.page.clone()
            },
            profiles: s.profiles,
            bytes: s.bytes,
            estimated: s.estimated,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let total: usize = summaries.iter().map(|s| s.profiles).sum();
    let oversized = summaries.iter().filter(|s| s.oversized).count();
    println!(
        "{} {} page(s), {} profile(s)",
        "✓".green(),
        summaries.len(),
        total
    );
    if oversized > 0 {
        println!(
            "{} {oversized} page(s) exceed {MAX_PAGE_BYTES} bytes",
            "!".yellow()
        );
    }
}
