//! Migration job queueing and dispatch.
//!
//! ## Design
//!
//! - Jobs wait in a durable FIFO queue and move atomically between its areas
//!   (pending → processing → done, or pending → rejected when undecodable)
//! - The dispatcher runs at most `max_concurrent` jobs at once, each on its
//!   own thread, and blocks on the queue instead of polling
//! - Failed jobs stay in processing until an operator requeues them
//!
//! ## Components
//!
//! - `JobQueue`: queue abstraction (in-memory here, Redis in [`crate::redis`])
//! - `JobDispatcher`: claims jobs and runs the handler for each
//! - `JobDispatcherHandle`: shutdown and runtime statistics

pub mod dispatcher;
pub mod store;

pub use dispatcher::{
    DispatcherConfig, DispatcherStats, JobDispatcher, JobDispatcherHandle, JobHandler,
};
pub use store::{ClaimedJob, InMemoryJobQueue, JobQueue, QueueError, QueueStats};
