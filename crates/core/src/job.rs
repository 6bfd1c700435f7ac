//! The migration job record and its queue wire format.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;

/// Archive extension expected on the attachment path.
const ARCHIVE_EXTENSION: &str = "zip";

/// JSON descriptor pushed onto the pending list by the mail intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Free-text sender header, e.g. `"Doe, Jane <jane@example.com>"`.
    pub from: String,
    /// Destination account email.
    pub email_address: String,
    /// Path of the exported archive, `…/<job_id>.zip`.
    pub attachment: String,
}

/// One customer's migration unit. Immutable once dequeued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    sender: String,
    email: String,
    archive: PathBuf,
}

impl Job {
    /// Validate a payload and derive the job id from the archive file stem.
    pub fn from_payload(payload: JobPayload) -> DomainResult<Self> {
        let email = payload.email_address.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => {
                return Err(DomainError::validation(format!(
                    "email_address {email:?} is not an address"
                )));
            }
        }

        let archive = PathBuf::from(payload.attachment.trim());
        let is_zip = archive
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
        if !is_zip {
            return Err(DomainError::validation(format!(
                "attachment {:?} is not a .{ARCHIVE_EXTENSION} archive",
                payload.attachment
            )));
        }

        let stem = archive
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| DomainError::validation("attachment has no file name"))?;
        // Job ids name directories: one plain segment only.
        let mut components = Path::new(stem).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(segment)), None) if segment == stem
        ) {
            return Err(DomainError::validation(format!(
                "attachment {:?} does not name a usable job id",
                payload.attachment
            )));
        }
        let id = JobId::new(stem)?;

        Ok(Self {
            id,
            sender: payload.from,
            email: email.to_string(),
            archive,
        })
    }

    /// Decode a raw queue entry. Any shape mismatch is a `Decode` error.
    pub fn decode(raw: &str) -> DomainResult<Self> {
        let payload: JobPayload =
            serde_json::from_str(raw).map_err(|e| DomainError::decode(e.to_string()))?;
        Self::from_payload(payload)
    }

    /// Re-encode the job in the queue wire format.
    pub fn to_payload(&self) -> JobPayload {
        JobPayload {
            from: self.sender.clone(),
            email_address: self.email.clone(),
            attachment: self.archive.to_string_lossy().into_owned(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }
}
