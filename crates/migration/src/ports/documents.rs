//! Remote document-creation API.

use std::collections::HashSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use padmigrate_core::ClientId;

/// Credential pair authenticating create calls for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub client_id: ClientId,
    pub secret: String,
}

/// Document to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    pub body: String,
    pub subtitle: String,
    pub content_type: String,
}

/// Decoded create response. The id may arrive under any of three names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentResult {
    #[serde(default)]
    pub pad_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl CreateDocumentResult {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            pad_id: Some(id.into()),
            ..Self::default()
        }
    }

    /// The first non-empty id, checked as `padId`, `documentId`, `id`.
    pub fn document_id(&self) -> Option<&str> {
        [&self.pad_id, &self.document_id, &self.id]
            .into_iter()
            .filter_map(|id| id.as_deref())
            .find(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response could not be decoded: {0}")]
    Decode(String),
}

pub trait DocumentApi: Send + Sync {
    fn create_document(
        &self,
        credentials: &ApiCredentials,
        document: &NewDocument,
    ) -> Result<CreateDocumentResult, DocumentApiError>;
}

/// Records every create call; titles listed in `rejecting` get an empty
/// response.
#[derive(Debug, Default)]
pub struct RecordingDocumentApi {
    created: Mutex<Vec<(ApiCredentials, NewDocument)>>,
    rejecting: HashSet<String>,
}

impl RecordingDocumentApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, title: impl Into<String>) -> Self {
        self.rejecting.insert(title.into());
        self
    }

    pub fn calls(&self) -> Vec<(ApiCredentials, NewDocument)> {
        self.created.lock().unwrap().clone()
    }
}

impl DocumentApi for RecordingDocumentApi {
    fn create_document(
        &self,
        credentials: &ApiCredentials,
        document: &NewDocument,
    ) -> Result<CreateDocumentResult, DocumentApiError> {
        let mut created = self.created.lock().unwrap();
        created.push((credentials.clone(), document.clone()));
        if self.rejecting.contains(&document.title) {
            return Ok(CreateDocumentResult::default());
        }
        Ok(CreateDocumentResult::created(format!("doc-{}", created.len())))
    }
}
