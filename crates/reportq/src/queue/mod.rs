//! The report queue: repository operations, booking and payload access
//! behind one handle.
//!
//! All timestamps come from the injected [`Clock`]. Cloning is cheap and
//! clones share the same database connection.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::archive::{ArchiveStore, ExtractedReport};
use crate::broadcast::{QueueEvent, QueueEventBroadcaster};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::{report_repo, Database};
use crate::error::{ArchiveError, QueueError};
use crate::model::{AnalysisReport, NewReport, ReportId, ReportStatus};

mod booking;

#[derive(Clone)]
pub struct ReportQueue {
    db: Database,
    clock: Arc<dyn Clock>,
    archive: ArchiveStore,
    events: Option<QueueEventBroadcaster>,
}

impl ReportQueue {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            archive: ArchiveStore::in_temp_dir(),
            events: None,
        }
    }

    /// Opens the configured database and wires the work directory and an
    /// event broadcaster of the configured capacity.
    pub fn from_config(config: &Config) -> Result<Self, QueueError> {
        let db = Database::open(&config.database_path)?;
        Ok(Self::new(db)
            .with_archive_store(ArchiveStore::new(&config.work_directory))
            .with_events(QueueEventBroadcaster::new(config.event_capacity)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_archive_store(mut self, archive: ArchiveStore) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_events(mut self, events: QueueEventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> Option<&QueueEventBroadcaster> {
        self.events.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn emit(&self, event: QueueEvent) {
        if let Some(events) = &self.events {
            events.send(event);
        }
    }

    /// Adds a report as `PENDING` and returns its id.
    pub fn enqueue(&self, report: NewReport) -> Result<ReportId, QueueError> {
        let (project_key, snapshot_id) = report.validate()?;
        let id = report_repo::insert(
            &self.db,
            project_key,
            snapshot_id,
            report.data.as_deref(),
            self.now(),
        )?;

        log::debug!("Enqueued report {} for project {}", id, project_key);
        self.emit(QueueEvent::Enqueued {
            id,
            project_key: project_key.to_string(),
        });
        Ok(id)
    }

    /// Report metadata. The payload is never loaded here.
    pub fn find_by_id(&self, id: ReportId) -> Result<Option<AnalysisReport>, QueueError> {
        Ok(report_repo::find_by_id(&self.db, id)?)
    }

    pub fn find_by_project_key(&self, project_key: &str) -> Result<Vec<AnalysisReport>, QueueError> {
        Ok(report_repo::find_by_project_key(&self.db, project_key)?)
    }

    /// Snapshot of the whole queue, for diagnostics.
    pub fn find_all(&self) -> Result<Vec<AnalysisReport>, QueueError> {
        Ok(report_repo::find_all(&self.db)?)
    }

    pub fn count_by_status(&self, status: ReportStatus) -> Result<u64, QueueError> {
        Ok(report_repo::count_by_status(&self.db, status)?)
    }

    /// Removes a report and its payload. A missing report is a no-op.
    pub fn delete(&self, id: ReportId) -> Result<(), QueueError> {
        if report_repo::delete(&self.db, id)? {
            log::debug!("Deleted report {}", id);
            self.emit(QueueEvent::Deleted { id });
        }
        Ok(())
    }

    /// Removes every report, whatever its status.
    pub fn purge_all(&self) -> Result<usize, QueueError> {
        let count = report_repo::purge_all(&self.db)?;
        log::warn!("Purged {} reports from the queue", count);
        self.emit(QueueEvent::Purged { count });
        Ok(count)
    }

    /// Records that the caller has an outcome for this report.
    pub fn mark_finished(&self, id: ReportId) -> Result<bool, QueueError> {
        Ok(report_repo::mark_finished(&self.db, id, self.now())?)
    }

    /// Extracts the report payload into a fresh directory owned by the result.
    pub fn decompress(&self, id: ReportId) -> Result<ExtractedReport, QueueError> {
        let payload = report_repo::read_data(&self.db, id)
            .map_err(ArchiveError::from)?
            .ok_or(ArchiveError::ArtifactMissing(id))?;
        Ok(self.archive.extract(id, &payload)?)
    }

    /// Lookup by natural key. Not implemented.
    pub fn find_by_key(&self, _key: &str) -> Result<Option<AnalysisReport>, QueueError> {
        Err(QueueError::Unsupported {
            operation: "find_by_key",
        })
    }

    /// In-place update of an existing report. Not implemented; status only
    /// changes through booking and the recovery sweep.
    pub fn update(&self, _report: &AnalysisReport) -> Result<(), QueueError> {
        Err(QueueError::Unsupported {
            operation: "update",
        })
    }

    /// Parameters for incremental synchronization. Not implemented.
    pub fn synchronization_params(
        &self,
        _since: DateTime<Utc>,
        _params: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, QueueError> {
        Err(QueueError::Unsupported {
            operation: "synchronization_params",
        })
    }
}
