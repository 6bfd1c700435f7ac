//! External service clients/adapters.

pub mod asset_fetcher;
pub mod asset_store;
pub mod document_api;
pub mod smtp;

#[cfg(test)]
pub(crate) mod test_server;

pub use asset_fetcher::HttpAssetFetcher;
pub use asset_store::{HttpAssetStore, HttpAssetStoreConfig};
pub use document_api::HttpDocumentApi;
pub use smtp::{SmtpConfig, SmtpNotifier};

use std::time::Duration;

/// User agent sent on every outgoing HTTP request.
pub const USER_AGENT: &str = concat!("padmigrate/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client shared by the adapters in this module.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}
