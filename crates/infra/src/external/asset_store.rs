//! HTTP object store for republished assets.
//!
//! Objects are probed with `HEAD {endpoint}/{key}` and written with
//! `PUT {endpoint}/{key}`; readers fetch them from `{public_url}/{key}`.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES};
use tracing::{debug, instrument};

use padmigrate_migration::ports::{AssetError, AssetStore, AssetUpload};

/// Canned-ACL header understood by S3-compatible stores.
const ACL_HEADER: &str = "x-amz-acl";

/// HTTP-date layout for the `Expires` header.
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone)]
pub struct HttpAssetStoreConfig {
    /// Write endpoint, usually the bucket URL
    pub endpoint: String,
    /// Base of the URLs written into documents
    pub public_url: String,
    /// Sent as a bearer token on every request when set
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    client: reqwest::blocking::Client,
    config: HttpAssetStoreConfig,
}

impl HttpAssetStore {
    pub fn new(config: HttpAssetStoreConfig) -> Result<Self, AssetError> {
        let client =
            super::http_client(config.timeout).map_err(|e| AssetError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn authorized(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// `base` with `key` appended as one percent-encoded path segment.
fn object_url(base: &str, key: &str) -> String {
    let joined = Url::parse(base).ok().and_then(|mut url| {
        url.path_segments_mut().ok()?.pop_if_empty().push(key);
        Some(url)
    });
    match joined {
        Some(url) => url.into(),
        None => format!("{}/{}", base.trim_end_matches('/'), key),
    }
}

impl AssetStore for HttpAssetStore {
    fn exists(&self, key: &str) -> Result<bool, AssetError> {
        let url = object_url(&self.config.endpoint, key);
        let response = self
            .authorized(self.client.head(&url))
            .send()
            .map_err(|e| AssetError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(AssetError::Status(status.as_u16())),
        }
    }

    #[instrument(skip(self, upload), fields(content_type = %upload.content_type, size = upload.body.len()))]
    fn put(&self, key: &str, upload: AssetUpload) -> Result<(), AssetError> {
        let url = object_url(&self.config.endpoint, key);
        let mut request = self
            .authorized(self.client.put(&url))
            .header(CONTENT_TYPE, &upload.content_type)
            .header(CACHE_CONTROL, &upload.cache_control)
            .header(EXPIRES, upload.expires.format(HTTP_DATE).to_string());
        if upload.public_read {
            request = request.header(ACL_HEADER, "public-read");
        }

        let response = request
            .body(upload.body)
            .send()
            .map_err(|e| AssetError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status(status.as_u16()));
        }
        debug!("asset stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        object_url(&self.config.public_url, key)
    }
}
