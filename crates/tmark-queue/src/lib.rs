//! Redis-backed job queue and progress transport.

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::EnrichJob;
pub use progress::{ProgressChannel, DEFAULT_HISTORY_LIMIT};
pub use queue::{JobQueue, QueueConfig};
