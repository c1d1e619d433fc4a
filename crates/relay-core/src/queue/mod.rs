//! Queue module: configuration, pending-set ordering, and the request queue.

mod builder;
mod config;
mod pending;
mod request_queue;

pub use builder::RequestQueueBuilder;
pub use config::{OrderingMode, QueueConfig};
pub use pending::PendingSet;
pub use request_queue::RequestQueue;
