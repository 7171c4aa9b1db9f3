//! Dry-run unified diff support for `gitdm normalize --dry-run`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use gitdm_core::{
    canonicalize_all,
    pages::{self, list_page_numbers_at, page_path_at},
    plan_chunks,
};

use crate::{error::io_err, SyncError};

/// A single page diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// What normalizing a page directory would change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationPreview {
    /// Page count after normalization.
    pub pages: usize,
    pub diffs: Vec<PageDiff>,
}

/// Render the normalized pages in memory and compare them to what is on disk.
///
/// Pages that would be removed show up as a diff to empty content. No files
/// are written.
pub fn preview_normalization(dir: &Path, cap: usize) -> Result<NormalizationPreview, SyncError> {
    let mut profiles = pages::read_profiles_at(dir)?;
    canonicalize_all(&mut profiles);
    let ranges = plan_chunks(&profiles, cap);

    let mut diffs = Vec::new();
    for (index, range) in ranges.iter().enumerate() {
        let path = page_path_at(dir, index + 1);
        let rendered = pages::render_page(&profiles[range.clone()])?;
        let existing = read_existing_or_empty(&path)?;
        if let Some(diff) = page_diff(dir, &path, &existing, &rendered) {
            diffs.push(diff);
        }
    }

    for number in list_page_numbers_at(dir)? {
        if number <= ranges.len() {
            continue;
        }
        let path = page_path_at(dir, number);
        let existing = read_existing_or_empty(&path)?;
        if let Some(diff) = page_diff(dir, &path, &existing, "") {
            diffs.push(diff);
        }
    }

    Ok(NormalizationPreview {
        pages: ranges.len(),
        diffs,
    })
}

fn page_diff(dir: &Path, path: &Path, existing: &str, rendered: &str) -> Option<PageDiff> {
    if existing == rendered {
        return None;
    }
    let relative = path.strip_prefix(dir).unwrap_or(path);
    let old_header = format!("a/{}", relative.display());
    let new_header = format!("b/{}", relative.display());
    let unified = TextDiff::from_lines(existing, rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Some(PageDiff {
        path: path.to_path_buf(),
        unified_diff: unified,
    })
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.replace("\r\n", "\n")),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}
