//! Boundaries to the systems a migration talks to.
//!
//! Each submodule holds one trait and an in-memory implementation used by
//! tests and local runs. Production adapters live in `padmigrate-infra`.

pub mod accounts;
pub mod archive;
pub mod assets;
pub mod client_ids;
pub mod documents;
pub mod notify;

pub use accounts::{AccountStore, InMemoryAccountStore, NewAccount};
pub use archive::{ArchiveEntry, ArchiveError, ArchiveExtractor, EntryKind, StaticArchives};
pub use assets::{
    AssetError, AssetFetcher, AssetStore, AssetUpload, FetchError, InMemoryAssetStore,
    StaticAssetFetcher,
};
pub use client_ids::{ClientIdLookup, InMemoryClientIds};
pub use documents::{
    ApiCredentials, CreateDocumentResult, DocumentApi, DocumentApiError, NewDocument,
    RecordingDocumentApi,
};
pub use notify::{Email, Notifier, NotifyError, RecordingNotifier};
