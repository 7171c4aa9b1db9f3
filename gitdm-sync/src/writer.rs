//! Page writer.
//!
//! ## `write_pages` protocol
//!
//! 1. Plan contiguous ranges with [`plan_chunks`].
//! 2. Render each range as `profiles<N>.yaml`, N from 1.
//! 3. Compare the rendered page with the bytes currently on disk.
//! 4. Skip the page if they match.
//! 5. Otherwise write to `<path>.gitdm.tmp` and rename over the page.
//! 6. Remove every page file numbered above the new page count.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use gitdm_core::{
    canonicalize_all,
    pages::{self, list_page_numbers_at, page_path_at},
    plan_chunks, Profile,
};

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual page write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Page was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Page was skipped: rendered content matches what is on disk.
    Unchanged { path: PathBuf },
    /// Leftover page from a previous run with more pages.
    Removed { path: PathBuf },
}

/// Summary of one [`write_pages`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWriteReport {
    /// Number of pages the profiles now occupy.
    pub pages: usize,
    pub writes: Vec<WriteResult>,
}

impl PageWriteReport {
    pub fn written(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Written { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Unchanged { .. }))
    }

    pub fn removed(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Removed { .. }))
    }

    /// `true` if any page file was written or removed.
    pub fn changed(&self) -> bool {
        self.written() + self.removed() > 0
    }

    fn count(&self, pred: impl Fn(&WriteResult) -> bool) -> usize {
        self.writes.iter().filter(|w| pred(w)).count()
    }
}

// ---------------------------------------------------------------------------
// atomic_write
// ---------------------------------------------------------------------------

/// Atomically write a single page unless the on-disk bytes already match.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<WriteResult, SyncError> {
    let tmp = PathBuf::from(format!("{}.gitdm.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<WriteResult, SyncError> {
    match std::fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(path, err)),
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// write_pages
// ---------------------------------------------------------------------------

/// Pack `profiles` into size-bounded pages under `dir`, replacing prior pages.
///
/// `profiles` must already be in canonical order; this function preserves
/// their order exactly.
pub fn write_pages(dir: &Path, profiles: &[Profile], cap: usize) -> Result<PageWriteReport, SyncError> {
    let ranges = plan_chunks(profiles, cap);
    tracing::info!(
        "fitting {} profiles into {} page(s) of at most {cap} estimated bytes",
        profiles.len(),
        ranges.len()
    );

    let mut writes = Vec::with_capacity(ranges.len());
    for (index, range) in ranges.iter().enumerate() {
        let path = page_path_at(dir, index + 1);
        tracing::debug!("page {} holds profiles [{}-{})", index + 1, range.start, range.end);
        let content = pages::render_page(&profiles[range.clone()])?;
        writes.push(atomic_write(&path, &content)?);
    }

    writes.extend(remove_pages_above(dir, ranges.len())?);

    Ok(PageWriteReport {
        pages: ranges.len(),
        writes,
    })
}

/// Read every page under `dir`, canonicalize, and rewrite the pages.
///
/// Returns the canonical profiles alongside the write report.
pub fn normalize_pages(dir: &Path, cap: usize) -> Result<(Vec<Profile>, PageWriteReport), SyncError> {
    let mut profiles = pages::read_profiles_at(dir)?;
    canonicalize_all(&mut profiles);
    let report = write_pages(dir, &profiles, cap)?;
    Ok((profiles, report))
}

/// Delete every page file in `dir` numbered above `keep`.
fn remove_pages_above(dir: &Path, keep: usize) -> Result<Vec<WriteResult>, SyncError> {
    let mut removed = Vec::new();
    for number in list_page_numbers_at(dir)? {
        if number <= keep {
            continue;
        }
        let path = page_path_at(dir, number);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("removed stale page: {}", path.display());
                removed.push(WriteResult::Removed { path });
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&path, err)),
        }
    }
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gitdm_core::{pages::read_profiles_at, EstimatedSize};
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn people(n: usize) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = (0..n)
            .map(|i| Profile {
                email: Some(format!("p{i}@example.com")),
                ..Profile::named(format!("Person {i:04}"))
            })
            .collect();
        canonicalize_all(&mut profiles);
        profiles
    }

    #[test]
    fn first_write_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profiles1.yaml");
        let result = atomic_write(&path, "P: []\n").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert!(path.exists());
    }

    #[test]
    fn second_write_same_content_returns_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profiles1.yaml");
        atomic_write(&path, "same content").unwrap();
        let result = atomic_write(&path, "same content").unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));
    }

    #[test]
    fn changed_content_returns_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profiles1.yaml");
        atomic_write(&path, "v1").unwrap();
        let result = atomic_write(&path, "v2").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    }

    #[test]
    fn same_length_different_bytes_is_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profiles1.yaml");
        atomic_write(&path, "P:\n- U: A\n").unwrap();
        let result = atomic_write(&path, "P:\n- U: B\n").unwrap();
        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "P:\n- U: B\n");
    }

    #[test]
    fn tmp_file_removed_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("profiles1.yaml");
        atomic_write(&path, "data").unwrap();
        let tmp_path = PathBuf::from(format!("{}.gitdm.tmp", path.display()));
        assert!(!tmp_path.exists(), ".gitdm.tmp must be cleaned up");
    }

    #[test]
    fn unchanged_pages_keep_their_mtime() {
        let tmp = TempDir::new().unwrap();
        let profiles = people(3);
        write_pages(tmp.path(), &profiles, gitdm_core::MAX_PAGE_BYTES).unwrap();

        let page = tmp.path().join("profiles1.yaml");
        let mtime_1 = fs::metadata(&page).unwrap().modified().unwrap();
        sleep(Duration::from_millis(1100));

        let report = write_pages(tmp.path(), &profiles, gitdm_core::MAX_PAGE_BYTES).unwrap();
        let mtime_2 = fs::metadata(&page).unwrap().modified().unwrap();
        assert_eq!(mtime_1, mtime_2, "mtime changed; page was rewritten");
        assert!(!report.changed());
        assert_eq!(report.unchanged(), 1);
    }

    #[test]
    fn small_cap_spreads_profiles_over_pages_in_order() {
        let tmp = TempDir::new().unwrap();
        let profiles = people(10);
        let per_profile = profiles[0].estimated_size();
        let report = write_pages(tmp.path(), &profiles, per_profile * 3).unwrap();

        assert!(report.pages >= 4, "expected several pages, got {}", report.pages);
        assert_eq!(report.written(), report.pages);
        assert_eq!(read_profiles_at(tmp.path()).unwrap(), profiles);
    }

    #[test]
    fn shrinking_removes_stale_pages() {
        let tmp = TempDir::new().unwrap();
        let profiles = people(10);
        let per_profile = profiles[0].estimated_size();
        let before = write_pages(tmp.path(), &profiles, per_profile * 2).unwrap();
        assert!(before.pages >= 5);

        // Leftover beyond a gap is removed too.
        fs::write(tmp.path().join("profiles40.yaml"), "P: []\n").unwrap();

        let after = write_pages(tmp.path(), &profiles, gitdm_core::MAX_PAGE_BYTES).unwrap();
        assert_eq!(after.pages, 1);
        assert_eq!(after.removed(), before.pages - 1 + 1);
        assert_eq!(
            gitdm_core::pages::list_page_numbers_at(tmp.path()).unwrap(),
            vec![1]
        );
        assert_eq!(read_profiles_at(tmp.path()).unwrap(), profiles);
    }

    #[test]
    fn empty_input_removes_all_pages() {
        let tmp = TempDir::new().unwrap();
        write_pages(tmp.path(), &people(2), gitdm_core::MAX_PAGE_BYTES).unwrap();
        let report = write_pages(tmp.path(), &[], gitdm_core::MAX_PAGE_BYTES).unwrap();
        assert_eq!(report.pages, 0);
        assert_eq!(report.removed(), 1);
        assert!(!tmp.path().join("profiles1.yaml").exists());
    }

    #[test]
    fn normalize_sorts_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("profiles1.yaml"), "P:\n- U: B\n- U: A\n").unwrap();

        let (profiles, first) = normalize_pages(tmp.path(), gitdm_core::MAX_PAGE_BYTES).unwrap();
        let names: Vec<_> = profiles.iter().filter_map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(first.changed());

        let (_, second) = normalize_pages(tmp.path(), gitdm_core::MAX_PAGE_BYTES).unwrap();
        assert!(!second.changed());
    }

    #[test]
    fn non_page_files_are_left_alone() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("README.md"), "docs").unwrap();
        fs::write(tmp.path().join("profiles.yaml"), "x").unwrap();
        write_pages(tmp.path(), &people(1), gitdm_core::MAX_PAGE_BYTES).unwrap();
        assert!(tmp.path().join("README.md").exists());
        assert!(tmp.path().join("profiles.yaml").exists());
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();

        let path = readonly_dir.join("profiles1.yaml");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("profiles1.yaml.gitdm.tmp");

        let result = atomic_write_with_tmp(&path, "new content", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // Running as root ignores directory permissions; nothing to assert then.
        if result.is_ok() {
            return;
        }
        let current = fs::read_to_string(&path).unwrap();
        assert_eq!(current, "original", "original page should be intact");
        assert!(!tmp_path.exists(), ".gitdm.tmp should be cleaned up");
    }
}
