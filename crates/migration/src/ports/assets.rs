//! Durable asset storage and legacy asset retrieval.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};

/// Object written to the asset store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
    pub expires: DateTime<Utc>,
    pub public_read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("asset store transport error: {0}")]
    Transport(String),
    #[error("asset store returned status {0}")]
    Status(u16),
}

/// Key/value blob store the rewritten references point to.
pub trait AssetStore: Send + Sync {
    /// Whether an object already exists under `key`.
    fn exists(&self, key: &str) -> Result<bool, AssetError>;

    /// Write an object under `key`.
    fn put(&self, key: &str, upload: AssetUpload) -> Result<(), AssetError>;

    /// Public URL of the object stored under `key`.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,
    #[error("http status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// The server answered, but not with the asset.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::NotFound | Self::Status(_))
    }
}

/// Fetches asset bytes from the legacy host.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// In-memory asset store for tests/dev.
#[derive(Debug)]
pub struct InMemoryAssetStore {
    base_url: String,
    objects: RwLock<HashMap<String, AssetUpload>>,
    puts: Mutex<Vec<String>>,
}

impl InMemoryAssetStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    /// Keys in upload order, one entry per `put` call.
    pub fn uploads(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<AssetUpload> {
        self.objects.read().unwrap().get(key).cloned()
    }
}

impl AssetStore for InMemoryAssetStore {
    fn exists(&self, key: &str) -> Result<bool, AssetError> {
        Ok(self.objects.read().unwrap().contains_key(key))
    }

    fn put(&self, key: &str, upload: AssetUpload) -> Result<(), AssetError> {
        self.puts.lock().unwrap().push(key.to_string());
        self.objects.write().unwrap().insert(key.to_string(), upload);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Serves a fixed set of URLs; everything else is a 404.
#[derive(Debug, Default)]
pub struct StaticAssetFetcher {
    assets: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StaticAssetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.assets.insert(url.into(), bytes);
        self
    }

    /// Every URL requested, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl AssetFetcher for StaticAssetFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.assets.get(url).cloned().ok_or(FetchError::NotFound)
    }
}
