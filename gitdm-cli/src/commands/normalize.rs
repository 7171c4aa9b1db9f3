//! `gitdm normalize <dir>`: canonicalize and rewrite a local page directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use gitdm_core::MAX_PAGE_BYTES;
use gitdm_sync::{normalize_pages, preview_normalization, WriteResult};

/// Arguments for `gitdm normalize`.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Directory holding `profiles1.yaml`, `profiles2.yaml`, ...
    pub dir: PathBuf,

    /// Print the unified diff instead of writing any files.
    #[arg(long)]
    pub dry_run: bool,

    /// Estimated size budget per page.
    #[arg(long, default_value_t = MAX_PAGE_BYTES, hide = true)]
    pub page_cap: usize,
}

impl NormalizeArgs {
    pub fn run(self) -> Result<()> {
        if self.dry_run {
            return self.preview();
        }

        let (profiles, report) = normalize_pages(&self.dir, self.page_cap)
            .with_context(|| format!("normalize failed for {}", self.dir.display()))?;

        for write in &report.writes {
            match write {
                WriteResult::Written { path } => println!("  {} {}", "✎".cyan(), path.display()),
                WriteResult::Removed { path } => println!("  {} {}", "✗".red(), path.display()),
                WriteResult::Unchanged { .. } => {}
            }
        }
        if !report.changed() {
            println!(
                "{} {} already normalized ({} profile(s))",
                "✓".green(),
                self.dir.display(),
                profiles.len()
            );
            return Ok(());
        }
        println!(
            "{} {} profile(s) in {} page(s) ({} written, {} unchanged, {} removed)",
            "✓".green(),
            profiles.len(),
            report.pages,
            report.written(),
            report.unchanged(),
            report.removed()
        );
        Ok(())
    }

    fn preview(&self) -> Result<()> {
        let preview = preview_normalization(&self.dir, self.page_cap)
            .with_context(|| format!("normalize preview failed for {}", self.dir.display()))?;

        if preview.diffs.is_empty() {
            println!("[dry-run] No differences for {}.", self.dir.display());
            return Ok(());
        }
        for diff in preview.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
