//! HTTP client for the document-creation API.

use std::time::Duration;

use tracing::{debug, instrument};

use padmigrate_migration::ports::{
    ApiCredentials, CreateDocumentResult, DocumentApi, DocumentApiError, NewDocument,
};

/// Path of the create endpoint, relative to the API base URL.
pub const CREATE_PATH: &str = "/api/1.0/pad/create";

#[derive(Debug, Clone)]
pub struct HttpDocumentApi {
    client: reqwest::blocking::Client,
    create_url: String,
}

impl HttpDocumentApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DocumentApiError> {
        let client =
            super::http_client(timeout).map_err(|e| DocumentApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            create_url: create_url(base_url),
        })
    }
}

fn create_url(base_url: &str) -> String {
    format!("{}{CREATE_PATH}", base_url.trim_end_matches('/'))
}

impl DocumentApi for HttpDocumentApi {
    #[instrument(skip_all, fields(client_id = %credentials.client_id, title = %document.title))]
    fn create_document(
        &self,
        credentials: &ApiCredentials,
        document: &NewDocument,
    ) -> Result<CreateDocumentResult, DocumentApiError> {
        let response = self
            .client
            .post(&self.create_url)
            .basic_auth(credentials.client_id.as_str(), Some(&credentials.secret))
            .json(document)
            .send()
            .map_err(|e| DocumentApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DocumentApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: CreateDocumentResult = response
            .json()
            .map_err(|e| DocumentApiError::Decode(e.to_string()))?;
        debug!(document_id = ?result.document_id(), "create call answered");
        Ok(result)
    }
}
