use crate::archive::ExtractedReport;
use crate::error::WorkerError;
use crate::model::{AnalysisReport, ReportId};

/// Downstream handling of a booked report.
///
/// `payload` is the extracted report archive, or `None` when the report was
/// enqueued without data. The directory is removed after `process` returns.
///
/// A panic inside `process` is caught by the worker pool and reported as a
/// failed outcome; the report is deleted like any other failure.
pub trait ReportProcessor: Send + Sync {
    fn process(
        &self,
        report: &AnalysisReport,
        payload: Option<&ExtractedReport>,
    ) -> Result<(), WorkerError>;
}

impl<F> ReportProcessor for F
where
    F: Fn(&AnalysisReport, Option<&ExtractedReport>) -> Result<(), WorkerError> + Send + Sync,
{
    fn process(
        &self,
        report: &AnalysisReport,
        payload: Option<&ExtractedReport>,
    ) -> Result<(), WorkerError> {
        self(report, payload)
    }
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub report_id: ReportId,
    pub project_key: String,
    pub worker_id: usize,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ReportOutcome {
    pub fn success(report: &AnalysisReport, worker_id: usize, duration_ms: u64) -> Self {
        Self {
            report_id: report.id,
            project_key: report.project_key.clone(),
            worker_id,
            success: true,
            error: None,
            duration_ms,
        }
    }

    pub fn failure(
        report: &AnalysisReport,
        worker_id: usize,
        duration_ms: u64,
        error: String,
    ) -> Self {
        Self {
            report_id: report.id,
            project_key: report.project_key.clone(),
            worker_id,
            success: false,
            error: Some(error),
            duration_ms,
        }
    }
}
