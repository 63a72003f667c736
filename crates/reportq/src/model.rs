//! Queue data model.
//!
//! An analysis report is one unit of work submitted for a project. It is
//! either waiting (`Pending`) or claimed by a worker (`Working`); finished
//! reports are deleted rather than moved to a terminal status.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// Store-assigned report identifier. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(pub i64);

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a queued report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Waiting to be booked.
    Pending,
    /// Booked by a worker.
    Working,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "PENDING",
            ReportStatus::Working => "WORKING",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReportStatus::Pending),
            "WORKING" => Ok(ReportStatus::Working),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

/// A stored report, without its payload.
///
/// Metadata reads never load the binary payload; `has_data` tells whether one
/// exists. Use [`crate::queue::ReportQueue::decompress`] to get at its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: ReportId,
    pub project_key: String,
    pub snapshot_id: i64,
    pub status: ReportStatus,
    pub has_data: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the report is `Working`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set by the caller once an outcome is known.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Builder for a report about to be enqueued.
#[derive(Debug, Clone, Default)]
pub struct NewReport {
    pub(crate) project_key: Option<String>,
    pub(crate) snapshot_id: Option<i64>,
    pub(crate) data: Option<Vec<u8>>,
}

impl NewReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a report with both required fields set.
    pub fn for_project(project_key: impl Into<String>, snapshot_id: i64) -> Self {
        Self::new().project_key(project_key).snapshot_id(snapshot_id)
    }

    pub fn project_key(mut self, key: impl Into<String>) -> Self {
        self.project_key = Some(key.into());
        self
    }

    pub fn snapshot_id(mut self, id: i64) -> Self {
        self.snapshot_id = Some(id);
        self
    }

    /// Attaches the compressed payload. Stored as opaque bytes.
    pub fn data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.data = Some(bytes.into());
        self
    }

    /// Checks the required fields, returning them on success.
    pub(crate) fn validate(&self) -> Result<(&str, i64), QueueError> {
        let project_key = self
            .project_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(QueueError::Validation {
                field: "project_key",
            })?;
        let snapshot_id = self.snapshot_id.ok_or(QueueError::Validation {
            field: "snapshot_id",
        })?;
        Ok((project_key, snapshot_id))
    }
}
