//! Test harness for isolated queue tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use reportq::archive::pack_directory;
use reportq::{ArchiveStore, Database, FixedClock, NewReport, ReportId, ReportQueue};

/// Isolated environment: a database file, a work directory for extraction
/// and a fixed clock.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub work_dir: PathBuf,
    pub clock: Arc<FixedClock>,
    pub queue: ReportQueue,
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 9, day, 0, 0, 0).unwrap()
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("reports.db");
        let work_dir = temp_dir.path().join("work");
        let clock = Arc::new(FixedClock::new(at(26)));

        let db = Database::open(&db_path).expect("Failed to open database");
        let queue = ReportQueue::new(db)
            .with_clock(clock.clone())
            .with_archive_store(ArchiveStore::new(&work_dir));

        Self {
            temp_dir,
            db_path,
            work_dir,
            clock,
            queue,
        }
    }

    /// A second queue handle on its own connection, like another worker
    /// process would have.
    pub fn independent_queue(&self) -> ReportQueue {
        let db = Database::open(&self.db_path).expect("Failed to reopen database");
        ReportQueue::new(db)
            .with_clock(self.clock.clone())
            .with_archive_store(ArchiveStore::new(&self.work_dir))
    }

    pub fn enqueue(&self, project_key: &str) -> ReportId {
        self.queue
            .enqueue(NewReport::for_project(project_key, 123))
            .expect("Failed to enqueue")
    }

    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.path().join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create scratch dir");
        dir
    }

    /// Zips the given `(relative path, content)` files into a payload.
    pub fn payload(&self, files: &[(&str, &str)]) -> Vec<u8> {
        let src = TempDir::new().expect("Failed to create temp dir");
        for (path, content) in files {
            write_file(src.path(), path, content);
        }
        pack_directory(src.path()).expect("Failed to pack payload")
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
