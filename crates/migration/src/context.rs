//! Dependencies handed to the pipeline components at construction.

use std::sync::Arc;

use padmigrate_core::DEFAULT_DOMAIN_ID;

use crate::ports::{
    AccountStore, ArchiveExtractor, AssetFetcher, AssetStore, ClientIdLookup, DocumentApi,
    Notifier,
};

/// URL prefix of assets hosted by the retiring service.
pub const LEGACY_ASSET_PREFIX: &str = "https://hackpad-attachments.s3.amazonaws.com/";

/// Static knobs for one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    /// Partition key for created accounts.
    pub domain_id: i64,
    /// Only asset URLs starting with this prefix are republished.
    pub legacy_asset_prefix: String,
    /// Sender address of every notification.
    pub mail_from: String,
    /// Recipient of failure reports.
    pub operator_email: String,
    /// Blind copy on customer mail.
    pub bcc: Option<String>,
    /// Login page mentioned to customers whose account was just created.
    pub login_url: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            domain_id: DEFAULT_DOMAIN_ID,
            legacy_asset_prefix: LEGACY_ASSET_PREFIX.to_string(),
            mail_from: "migration@stekpad.com".to_string(),
            operator_email: "ops@stekpad.com".to_string(),
            bcc: None,
            login_url: "https://stekpad.com/ep/account/sign-in".to_string(),
        }
    }
}

/// Shared handles to every external system a job touches.
///
/// Cloning is cheap; each worker gets the same adapters.
#[derive(Clone)]
pub struct MigrationContext {
    pub accounts: Arc<dyn AccountStore>,
    pub client_ids: Arc<dyn ClientIdLookup>,
    pub documents: Arc<dyn DocumentApi>,
    pub asset_store: Arc<dyn AssetStore>,
    pub asset_fetcher: Arc<dyn AssetFetcher>,
    pub archives: Arc<dyn ArchiveExtractor>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: MigrationSettings,
}

impl std::fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
