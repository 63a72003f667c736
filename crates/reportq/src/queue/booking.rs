//! Booking: claiming reports for exclusive processing.
//!
//! A successful booking is recorded only as `status = WORKING` in the store.
//! Nothing is locked while the report is processed, and there is no lease:
//! a report stays `WORKING` until it is deleted or until
//! [`ReportQueue::reset_all_to_pending`] runs at the next startup.

use crate::broadcast::QueueEvent;
use crate::db::report_repo;
use crate::error::QueueError;
use crate::model::{AnalysisReport, ReportId};

use super::ReportQueue;

impl ReportQueue {
    /// Previews the report a worker should book next, without claiming it.
    ///
    /// Reports are served oldest first. A report waits while an earlier report
    /// of the same project is `WORKING`; other projects are not held up.
    pub fn next_available(&self) -> Result<Option<AnalysisReport>, QueueError> {
        Ok(report_repo::next_available(self.database())?)
    }

    /// Atomically moves the candidate from `PENDING` to `WORKING`.
    ///
    /// `Ok(None)` means no claim: the report is gone, already booked, or
    /// queued behind an earlier report of its project. That is the normal
    /// outcome of losing a race. A missing id is a caller bug and fails with
    /// [`QueueError::Precondition`].
    pub fn book(
        &self,
        candidate: impl Into<Option<ReportId>>,
    ) -> Result<Option<AnalysisReport>, QueueError> {
        self.book_for_worker(candidate.into(), None)
    }

    pub(crate) fn book_for_worker(
        &self,
        candidate: Option<ReportId>,
        worker_id: Option<usize>,
    ) -> Result<Option<AnalysisReport>, QueueError> {
        let id = candidate.ok_or_else(|| {
            QueueError::Precondition("cannot book a report without an id".to_string())
        })?;

        let booked = report_repo::book(self.database(), id, self.now())?;
        match &booked {
            Some(report) => {
                log::debug!("Booked report {} of project {}", id, report.project_key);
                self.emit(QueueEvent::Booked {
                    id,
                    project_key: report.project_key.clone(),
                    worker_id,
                });
            }
            None => log::trace!("Report {} not claimable", id),
        }
        Ok(booked)
    }

    /// Recovery sweep: every report goes back to `PENDING`.
    ///
    /// Must be called by the owning process before any worker starts polling.
    /// It cannot tell an orphaned report from one still running elsewhere, so
    /// only one worker pool may be active against a store at a time.
    pub fn reset_all_to_pending(&self) -> Result<usize, QueueError> {
        let count = report_repo::reset_all_to_pending(self.database(), self.now())?;
        log::info!("Recovery sweep reset {} reports to PENDING", count);
        self.emit(QueueEvent::Recovered { count });
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};

    use crate::clock::FixedClock;
    use crate::db::Database;
    use crate::model::{NewReport, ReportStatus};

    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2014, 9, day, 0, 0, 0).unwrap()
    }

    fn test_queue(clock: Arc<FixedClock>) -> ReportQueue {
        ReportQueue::new(Database::open_in_memory().unwrap()).with_clock(clock)
    }

    #[test]
    fn test_book_without_id_is_precondition_error() {
        let queue = test_queue(Arc::new(FixedClock::new(at(26))));
        assert!(matches!(
            queue.book(None::<ReportId>),
            Err(QueueError::Precondition(_))
        ));
    }

    #[test]
    fn test_single_report_lifecycle() {
        let clock = Arc::new(FixedClock::new(at(26)));
        let queue = test_queue(clock.clone());
        let id = queue.enqueue(NewReport::for_project("P1", 42)).unwrap();

        let next = queue.next_available().unwrap().unwrap();
        assert_eq!(next.id, id);
        assert_eq!(next.status, ReportStatus::Pending);

        clock.set(at(30));
        let booked = queue.book(next.id).unwrap().unwrap();
        assert_eq!(booked.status, ReportStatus::Working);
        assert_eq!(booked.started_at, Some(at(30)));

        assert!(queue.book(next.id).unwrap().is_none());
    }

    #[test]
    fn test_fifo_within_project() {
        let queue = test_queue(Arc::new(FixedClock::new(at(26))));
        let first = queue.enqueue(NewReport::for_project("P1", 1)).unwrap();
        let second = queue.enqueue(NewReport::for_project("P1", 2)).unwrap();

        queue.book(first).unwrap().unwrap();
        assert!(queue.next_available().unwrap().is_none());
        assert!(queue.book(second).unwrap().is_none());

        queue.delete(first).unwrap();
        assert_eq!(queue.next_available().unwrap().unwrap().id, second);
    }

    #[test]
    fn test_other_projects_not_blocked() {
        let queue = test_queue(Arc::new(FixedClock::new(at(26))));
        let a = queue.enqueue(NewReport::for_project("P", 1)).unwrap();
        let _b = queue.enqueue(NewReport::for_project("P", 2)).unwrap();
        let c = queue.enqueue(NewReport::for_project("Q", 3)).unwrap();

        queue.book(a).unwrap().unwrap();
        assert_eq!(queue.next_available().unwrap().unwrap().id, c);
    }

    #[test]
    fn test_recovery_makes_report_claimable_again() {
        let clock = Arc::new(FixedClock::new(at(26)));
        let queue = test_queue(clock.clone());
        let id = queue.enqueue(NewReport::for_project("P1", 1)).unwrap();
        queue.book(id).unwrap().unwrap();

        clock.set(at(28));
        assert_eq!(queue.reset_all_to_pending().unwrap(), 1);

        let report = queue.find_by_id(id).unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert!(report.started_at.is_none());
        assert_eq!(report.updated_at, at(28));
        assert!(queue.book(id).unwrap().is_some());
    }

    #[test]
    fn test_recovery_is_idempotent() {
        let queue = test_queue(Arc::new(FixedClock::new(at(26))));
        let a = queue.enqueue(NewReport::for_project("P1", 1)).unwrap();
        queue.enqueue(NewReport::for_project("P2", 2)).unwrap();
        queue.book(a).unwrap().unwrap();

        queue.reset_all_to_pending().unwrap();
        let once = queue.find_all().unwrap();
        queue.reset_all_to_pending().unwrap();
        let twice = queue.find_all().unwrap();

        assert_eq!(once, twice);
        assert!(twice
            .iter()
            .all(|r| r.status == ReportStatus::Pending && r.started_at.is_none()));
    }

    #[test]
    fn test_booking_publishes_event() {
        let events = crate::broadcast::QueueEventBroadcaster::new(8);
        let queue = test_queue(Arc::new(FixedClock::new(at(26)))).with_events(events.clone());
        let id = queue.enqueue(NewReport::for_project("P1", 1)).unwrap();

        let mut rx = events.subscribe();
        queue.book_for_worker(Some(id), Some(3)).unwrap().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            QueueEvent::Booked {
                id,
                project_key: "P1".to_string(),
                worker_id: Some(3),
            }
        );
    }
}
