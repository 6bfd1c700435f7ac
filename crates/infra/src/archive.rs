//! Zip archive extraction with content sniffing.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use zip::ZipArchive;

use padmigrate_core::JobId;
use padmigrate_migration::ports::{ArchiveEntry, ArchiveError, ArchiveExtractor, EntryKind};

/// MIME type reported when nothing better is known.
const UNKNOWN_MIME: &str = "application/octet-stream";

/// Upper bound on the buffer reserved up front for one entry.
const MAX_PREALLOC: usize = 64 << 20;

/// Unpacks each job archive into `<work_dir>/<job_id>/`.
#[derive(Debug, Clone)]
pub struct ZipArchiveExtractor {
    work_dir: PathBuf,
}

impl ZipArchiveExtractor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Directory a job's files are unpacked into.
    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.work_dir.join(job_id.as_str())
    }
}

/// Buffer size to reserve for an entry whose header claims `declared` bytes.
/// Never more than `MAX_PREALLOC`.
fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |size| size.min(MAX_PREALLOC))
}

/// Classify an entry by its content, not its name.
pub fn sniff(contents: &[u8]) -> EntryKind {
    if infer::text::is_html(contents) {
        return EntryKind::Html;
    }
    let mime = infer::get(contents)
        .map(|kind| kind.mime_type())
        .unwrap_or(UNKNOWN_MIME);
    EntryKind::Other(mime.to_string())
}

impl ArchiveExtractor for ZipArchiveExtractor {
    #[instrument(skip(self, archive), fields(archive = %archive.display()), err)]
    fn extract(&self, job_id: &JobId, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        if !archive.is_file() {
            return Err(ArchiveError::NotFound(archive.to_path_buf()));
        }
        let mut zip = ZipArchive::new(File::open(archive)?)
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;

        let target = self.job_dir(job_id);
        fs::create_dir_all(&target)?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let mut file = zip
                .by_index(index)
                .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
            if file.is_dir() {
                continue;
            }
            let Some(relative) = file.enclosed_name() else {
                warn!(entry = %file.name(), "entry escapes the archive root; skipped");
                continue;
            };

            let mut contents = Vec::with_capacity(capacity_hint(file.size()));
            file.read_to_end(&mut contents)?;

            let out = target.join(&relative);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out, &contents)?;

            let kind = sniff(&contents);
            debug!(entry = %relative.display(), ?kind, "entry unpacked");
            entries.push(ArchiveEntry {
                name: relative.to_string_lossy().into_owned(),
                kind,
                contents,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn discard(&self, job_id: &JobId) -> Result<(), ArchiveError> {
        match fs::remove_dir_all(self.job_dir(job_id)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
