//! Archive extraction and file-type sniffing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use padmigrate_core::JobId;

/// Sniffed content type of one archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Html,
    /// Anything else, with the detected MIME type.
    Other(String),
}

/// One file unpacked from a job archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub kind: EntryKind,
    pub contents: Vec<u8>,
}

impl ArchiveEntry {
    pub fn html(name: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Html,
            contents: markup.into().into_bytes(),
        }
    }

    pub fn other(name: impl Into<String>, mime: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Other(mime.into()),
            contents,
        }
    }

    pub fn is_html(&self) -> bool {
        self.kind == EntryKind::Html
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive not found: {0}")]
    NotFound(PathBuf),
    #[error("archive is corrupt: {0}")]
    Corrupt(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unpacks `<job_id>.zip` and classifies its entries.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, job_id: &JobId, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Remove whatever `extract` left on disk for `job_id`.
    fn discard(&self, _job_id: &JobId) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Pre-built archives keyed by path, for tests/dev.
#[derive(Debug, Default, Clone)]
pub struct StaticArchives {
    archives: HashMap<PathBuf, Vec<ArchiveEntry>>,
    discarded: Arc<Mutex<Vec<JobId>>>,
}

impl StaticArchives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, entries: Vec<ArchiveEntry>) -> Self {
        self.archives.insert(path.into(), entries);
        self
    }

    /// Jobs whose extraction was discarded, in order.
    pub fn discarded(&self) -> Vec<JobId> {
        self.discarded.lock().unwrap().clone()
    }
}

impl ArchiveExtractor for StaticArchives {
    fn extract(&self, _job_id: &JobId, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        self.archives
            .get(archive)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(archive.to_path_buf()))
    }

    fn discard(&self, job_id: &JobId) -> Result<(), ArchiveError> {
        self.discarded.lock().unwrap().push(job_id.clone());
        Ok(())
    }
}
