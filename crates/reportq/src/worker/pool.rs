use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use tracing::info_span;

use crate::broadcast::QueueEvent;
use crate::config::Config;
use crate::error::{QueueError, WorkerError};
use crate::model::AnalysisReport;
use crate::queue::ReportQueue;
use crate::worker::processor::{ReportOutcome, ReportProcessor};

/// Attempts at booking before a worker backs off for a poll interval.
const MAX_BOOKING_ATTEMPTS: usize = 3;

/// Longest single sleep while idle, so shutdown is noticed quickly.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub worker_count: usize,
    pub poll_interval: Duration,
}

impl PoolConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Threads that poll the queue, book reports and hand them to a processor.
///
/// The pool does not run the recovery sweep; the owner calls
/// [`ReportQueue::reset_all_to_pending`] before [`WorkerPool::start`].
pub struct WorkerPool {
    outcome_receiver: Receiver<ReportOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn start(
        queue: ReportQueue,
        processor: Arc<dyn ReportProcessor>,
        config: PoolConfig,
    ) -> Result<Self, WorkerError> {
        if config.worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (outcome_sender, outcome_receiver) = unbounded::<ReportOutcome>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.worker_count);

        for worker_id in 0..config.worker_count {
            let worker = Worker {
                id: worker_id,
                queue: queue.clone(),
                processor: Arc::clone(&processor),
                outcomes: outcome_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                poll_interval: config.poll_interval,
            };

            let spawned = thread::Builder::new()
                .name(format!("reportq-worker-{worker_id}"))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shutdown.store(true, Ordering::Relaxed);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} report workers", config.worker_count);

        Ok(Self {
            outcome_receiver,
            workers,
            shutdown,
        })
    }

    pub fn try_recv_outcome(&self) -> Option<ReportOutcome> {
        self.outcome_receiver.try_recv().ok()
    }

    pub fn recv_outcome_timeout(&self, timeout: Duration) -> Option<ReportOutcome> {
        self.outcome_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Signals shutdown and joins every worker. A report being processed is
    /// finished first.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::Relaxed);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All report workers have stopped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

struct Worker {
    id: usize,
    queue: ReportQueue,
    processor: Arc<dyn ReportProcessor>,
    outcomes: Sender<ReportOutcome>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.claim_next() {
                Ok(Some(report)) => {
                    let outcome = self.handle(&report);
                    if self.outcomes.send(outcome).is_err() {
                        debug!("Worker {} outcome channel closed", self.id);
                        break;
                    }
                }
                Ok(None) => self.idle(),
                Err(e) => {
                    error!("Worker {} failed to poll the queue: {}", self.id, e);
                    self.idle();
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    /// Previews and books the next report. Losing the race to another worker
    /// just means trying the next candidate.
    fn claim_next(&self) -> Result<Option<AnalysisReport>, QueueError> {
        for _ in 0..MAX_BOOKING_ATTEMPTS {
            let Some(candidate) = self.queue.next_available()? else {
                return Ok(None);
            };
            if let Some(booked) = self
                .queue
                .book_for_worker(Some(candidate.id), Some(self.id))?
            {
                return Ok(Some(booked));
            }
        }
        Ok(None)
    }

    fn handle(&self, report: &AnalysisReport) -> ReportOutcome {
        let _span = info_span!("report.process",
            report_id = %report.id,
            project_key = %report.project_key,
            worker_id = self.id,
        )
        .entered();
        let started = Instant::now();

        let result = self.process(report);
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self.queue.mark_finished(report.id) {
            warn!("Failed to mark report {} finished: {}", report.id, e);
        }
        if let Err(e) = self.queue.delete(report.id) {
            error!("Failed to delete report {}: {}", report.id, e);
        }

        match result {
            Ok(()) => {
                info!("Report {} processed in {} ms", report.id, duration_ms);
                self.queue.emit(QueueEvent::Completed {
                    id: report.id,
                    project_key: report.project_key.clone(),
                    duration_ms,
                });
                ReportOutcome::success(report, self.id, duration_ms)
            }
            Err(message) => {
                error!("Report {} failed: {}", report.id, message);
                self.queue.emit(QueueEvent::Failed {
                    id: report.id,
                    project_key: report.project_key.clone(),
                    error: message.clone(),
                });
                ReportOutcome::failure(report, self.id, duration_ms, message)
            }
        }
    }

    fn process(&self, report: &AnalysisReport) -> Result<(), String> {
        let extracted = if report.has_data {
            Some(self.queue.decompress(report.id).map_err(|e| e.to_string())?)
        } else {
            None
        };

        // A panicking processor must not take the worker thread down with a
        // report still WORKING.
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.processor.process(report, extracted.as_ref())
        }));
        match result {
            Ok(processed) => processed.map_err(|e| e.to_string()),
            Err(payload) => Err(format!(
                "processor panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    fn idle(&self) {
        let deadline = Instant::now() + self.poll_interval;
        while !self.shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SHUTDOWN_CHECK));
        }
    }
}
