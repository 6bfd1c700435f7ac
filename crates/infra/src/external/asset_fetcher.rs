//! Retrieval of assets from the legacy host.

use std::time::Duration;

use reqwest::StatusCode;

use padmigrate_migration::ports::{AssetFetcher, FetchError};

#[derive(Debug, Clone)]
pub struct HttpAssetFetcher {
    client: reqwest::blocking::Client,
}

impl HttpAssetFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client =
            super::http_client(timeout).map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl AssetFetcher for HttpAssetFetcher {
    /// GET `url` as given; no re-encoding happens here.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .bytes()
                .map(|bytes| bytes.to_vec())
                .map_err(|e| FetchError::Transport(e.to_string())),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            status => Err(FetchError::Status(status.as_u16())),
        }
    }
}
