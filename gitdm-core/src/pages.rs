//! Profile page files.
//!
//! # Layout
//!
//! ```text
//! <working copy>/
//!   profiles1.yaml
//!   profiles2.yaml
//!   ...
//! ```
//!
//! Writers number pages contiguously from 1. A directory edited by hand may
//! still have gaps, so readers and writers both work from
//! [`list_page_numbers_at`], which reports every page file present.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ManifestError};
use crate::types::{PageView, Profile, ProfilePage};

pub const PAGE_PREFIX: &str = "profiles";
pub const PAGE_EXTENSION: &str = "yaml";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `profiles<number>.yaml`
pub fn page_file_name(number: usize) -> String {
    format!("{PAGE_PREFIX}{number}.{PAGE_EXTENSION}")
}

/// `<dir>/profiles<number>.yaml`. Pure, no I/O.
pub fn page_path_at(dir: &Path, number: usize) -> PathBuf {
    dir.join(page_file_name(number))
}

/// Page number encoded in a file name, if it is a page file.
///
/// `profiles0.yaml` and names with leading zeros are not pages.
pub fn page_number(file_name: &str) -> Option<usize> {
    let digits = file_name
        .strip_prefix(PAGE_PREFIX)?
        .strip_suffix(PAGE_EXTENSION)?
        .strip_suffix('.')?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// Every page number present in `dir`, ascending.
pub fn list_page_numbers_at(dir: &Path) -> Result<Vec<usize>, ManifestError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(io_err(dir, err)),
    };
    let mut numbers: Vec<usize> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| page_number(&e.file_name().to_string_lossy()))
        .collect();
    numbers.sort_unstable();
    Ok(numbers)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// A decoded page file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    pub number: usize,
    pub path: PathBuf,
    pub profiles: Vec<Profile>,
    pub bytes: usize,
}

/// Decode one page file.
///
/// Returns `ManifestError::Parse` (with path + line context) if malformed.
pub fn load_page(path: &Path) -> Result<ProfilePage, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    decode_page(path, &contents)
}

fn decode_page(path: &Path, contents: &str) -> Result<ProfilePage, ManifestError> {
    // An empty file is a valid page with no profiles.
    if contents.trim().is_empty() {
        return Ok(ProfilePage::default());
    }
    serde_yaml::from_str(contents).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read every page file in `dir`, in page-number order.
///
/// Pages past a gap in the numbering are read too, so a later rewrite never
/// drops their profiles.
pub fn read_pages_at(dir: &Path) -> Result<Vec<LoadedPage>, ManifestError> {
    let mut pages = Vec::new();
    for number in list_page_numbers_at(dir)? {
        let path = page_path_at(dir, number);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&path, err)),
        };
        let page = decode_page(&path, &contents)?;
        pages.push(LoadedPage {
            number,
            bytes: contents.len(),
            profiles: page.profiles,
            path,
        });
    }
    Ok(pages)
}

/// All profiles from [`read_pages_at`], in page order.
pub fn read_profiles_at(dir: &Path) -> Result<Vec<Profile>, ManifestError> {
    Ok(read_pages_at(dir)?
        .into_iter()
        .flat_map(|page| page.profiles)
        .collect())
}

// ---------------------------------------------------------------------------
// 3. Render
// ---------------------------------------------------------------------------

/// Serialize a slice of profiles as one page document.
pub fn render_page(profiles: &[Profile]) -> Result<String, ManifestError> {
    Ok(serde_yaml::to_string(&PageView { profiles })?)
}
