pub mod archive;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod queue;
pub mod worker;

pub use archive::{ArchiveStore, ExtractedReport};
pub use broadcast::{QueueEvent, QueueEventBroadcaster};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{ArchiveError, ConfigError, ExportError, QueueError, ReportqError, Result, WorkerError};
pub use export::{Component, ComponentsPublisher, ReportPublisher, ResourceRole};
pub use model::{AnalysisReport, NewReport, ReportId, ReportStatus};
pub use queue::ReportQueue;
pub use worker::{ReportOutcome, ReportProcessor, WorkerPool};
