//! `padmigrate-core`: shared building blocks for the hackpad migration worker.
//!
//! This crate holds the identifiers, the queued job record and its wire
//! format, and small pure helpers. No I/O lives here.

pub mod error;
pub mod id;
pub mod job;
pub mod sender;

pub use error::{DomainError, DomainResult};
pub use id::{AccountId, ClientId, JobId, DEFAULT_DOMAIN_ID};
pub use job::{Job, JobPayload};
pub use sender::display_name;
