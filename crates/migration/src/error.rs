//! Error kinds surfaced by the migration pipeline.

use padmigrate_core::{AccountId, DomainError, JobId};

use crate::ports::archive::ArchiveError;

/// Account/credential store and lookup-table failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store lookup failed: {0}")]
    Lookup(String),
    #[error("store write failed: {0}")]
    Persistence(String),
}

/// Failures that abort one job.
///
/// Per-file problems (a bad asset, a rejected create call) never show up
/// here; they are absorbed and counted as skipped.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no client id registered for account {account_id}")]
    ClientIdentityMissing { account_id: AccountId },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("archive for job {job_id} could not be read: {source}")]
    Archive {
        job_id: JobId,
        #[source]
        source: ArchiveError,
    },

    #[error("no files processed for job {job_id}")]
    NoFilesProcessed { job_id: JobId },

    #[error(
        "job {job_id}: {created} created + {skipped} skipped does not match {html_files} html files"
    )]
    CountMismatch {
        job_id: JobId,
        created: usize,
        skipped: usize,
        html_files: usize,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl MigrationError {
    /// Short machine-friendly tag used in logs and operator mail.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientIdentityMissing { .. } => "client_identity_missing",
            Self::Store(StoreError::Persistence(_)) => "persistence",
            Self::Store(_) => "lookup",
            Self::Archive { .. } => "archive",
            Self::NoFilesProcessed { .. } | Self::CountMismatch { .. } => "integrity",
            Self::Domain(_) => "decode",
        }
    }
}
