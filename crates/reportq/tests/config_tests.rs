//! A queue and worker pool built entirely from a loaded config file.

use std::sync::Arc;
use std::time::Duration;

use reportq::worker::PoolConfig;
use reportq::{
    load_config, AnalysisReport, ExtractedReport, NewReport, QueueEvent, ReportQueue,
    WorkerError, WorkerPool,
};
use tempfile::TempDir;

#[test]
fn test_loaded_config_drives_queue_and_pool() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("data").join("reports.db");
    let work_dir = temp.path().join("work");
    let config_path = temp.path().join("reportq.json");
    let document = serde_json::json!({
        "version": "1.0",
        "database_path": db_path,
        "work_directory": work_dir,
        "worker_count": 2,
        "poll_interval_ms": 10,
        "event_capacity": 16,
    });
    std::fs::write(&config_path, document.to_string()).unwrap();

    let config = load_config(&config_path).unwrap();
    let queue = ReportQueue::from_config(&config).unwrap();
    let mut events = queue.events().unwrap().subscribe();

    let src = temp.path().join("payload");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("issues.json"), "[]").unwrap();
    let payload = reportq::archive::pack_directory(&src).unwrap();
    let id = queue
        .enqueue(NewReport::for_project("P1", 7).data(payload))
        .unwrap();

    let expected_work_dir = work_dir.clone();
    let processor = Arc::new(
        move |_: &AnalysisReport, payload: Option<&ExtractedReport>| -> Result<(), WorkerError> {
            let payload = payload.ok_or_else(|| WorkerError::Processing("no payload".into()))?;
            if !payload.path().starts_with(&expected_work_dir) {
                return Err(WorkerError::Processing("extracted outside work dir".into()));
            }
            Ok(())
        },
    );

    let pool_config = PoolConfig::from_config(&config);
    assert_eq!(pool_config.worker_count, 2);
    assert_eq!(pool_config.poll_interval, Duration::from_millis(10));

    let pool = WorkerPool::start(queue.clone(), processor, pool_config).unwrap();
    let outcome = pool
        .recv_outcome_timeout(Duration::from_secs(10))
        .expect("worker pool stalled");
    pool.wait();

    assert!(outcome.success, "report failed: {:?}", outcome.error);
    assert_eq!(outcome.report_id, id);
    assert!(db_path.exists());
    assert!(queue.find_by_id(id).unwrap().is_none());

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(received.contains(&QueueEvent::Enqueued {
        id,
        project_key: "P1".to_string(),
    }));
    assert!(received.contains(&QueueEvent::Deleted { id }));
}
