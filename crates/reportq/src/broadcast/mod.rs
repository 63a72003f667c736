//! Broadcasting of queue events for live monitoring.

pub mod queue_events;

pub use queue_events::{QueueEvent, QueueEventBroadcaster};
