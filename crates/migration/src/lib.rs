//! `padmigrate-migration`: the per-job migration pipeline.
//!
//! ## Components
//!
//! - `AccountProvisioner`: resolves or creates the destination account and API credential
//! - `transform`: normalizes one exported document (envelope, title, empty-document check)
//! - `AssetMigrator`: republishes legacy-hosted images and rewrites their references
//! - `DocumentImporter`: walks one archive and creates a document per HTML file
//! - `JobOrchestrator`: ties the above together for one job and sends notifications
//!
//! External systems are reached only through the traits in [`ports`], bundled
//! into a [`MigrationContext`].

pub mod assets;
pub mod context;
pub mod error;
pub mod importer;
pub mod notification;
pub mod orchestrator;
pub mod ports;
pub mod provisioner;
pub mod transform;

pub use assets::AssetMigrator;
pub use context::{MigrationContext, MigrationSettings};
pub use error::{MigrationError, StoreError};
pub use importer::{DocumentImporter, ImportSummary};
pub use orchestrator::JobOrchestrator;
pub use provisioner::{AccountProvisioner, Provisioned, MIGRATION_TOKEN_TYPE};
