pub mod pool;
pub mod processor;

pub use pool::{PoolConfig, WorkerPool};
pub use processor::{ReportOutcome, ReportProcessor};

// Re-export crossbeam_channel for callers consuming outcomes
pub use crossbeam_channel;
