//! Redis adapters.

pub mod queue;

pub use queue::{QueueKeys, RedisJobQueue};
