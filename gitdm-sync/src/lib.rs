//! # gitdm-sync
//!
//! Page writing, diffing and the sync runs that move profiles between the
//! repository and the affiliation service.
//!
//! Call [`pipeline::run`] with a [`Flow`] to execute one run under the
//! process-wide [`SingleFlight`] gate.

pub mod client;
pub mod diff;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod preview;
pub mod repo;
pub mod writer;

pub use client::{AffiliationService, HttpAffiliationService};
pub use diff::ProfileDiff;
pub use error::{RepoError, ServiceError, SyncError};
pub use gate::{RunPermit, SingleFlight};
pub use pipeline::{Flow, RunContext, RunOutcome, RunState, SyncSettings, NO_CALLBACK_MARKER};
pub use preview::{preview_normalization, NormalizationPreview, PageDiff};
pub use repo::{GitCli, RemoteSpec, RepoStatus, Repository};
pub use writer::{normalize_pages, write_pages, PageWriteReport, WriteResult};
