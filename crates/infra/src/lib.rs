//! Infrastructure layer: job queue, dispatcher, DB, Redis, config, external
//! services.

pub mod archive;
pub mod client_ids;
pub mod config;
pub mod db;
pub mod external;
pub mod jobs;
pub mod redis;

pub use archive::ZipArchiveExtractor;
pub use client_ids::FileClientIdTable;
pub use config::{ConfigError, Settings};
pub use db::MySqlAccountStore;
pub use jobs::{JobDispatcher, JobDispatcherHandle, JobQueue};
pub use crate::redis::RedisJobQueue;
