//! gitdm core library: profile types, canonical ordering, size estimates,
//! page planning and page files.
//!
//! - [`types`]: `Profile`, `Identity`, `Enrollment` and wire documents
//! - [`canonical`]: canonical keys and [`canonicalize_all`]
//! - [`size`]: [`EstimatedSize`]
//! - [`chunk`]: [`plan_chunks`]
//! - [`pages`]: `profiles<N>.yaml` paths, load and render
//! - [`error`]: [`ManifestError`]

pub mod canonical;
pub mod chunk;
pub mod error;
pub mod pages;
pub mod size;
pub mod types;

pub use canonical::{canonicalize_all, CanonicalKey};
pub use chunk::{plan_chunks, MAX_PAGE_BYTES};
pub use error::ManifestError;
pub use size::EstimatedSize;
pub use types::{BulkUpdate, Enrollment, Identity, PageView, Profile, ProfilePage, StatusText};
