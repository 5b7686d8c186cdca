mod common;

use std::sync::Arc;

use futures::StreamExt;
use speedwatch::prelude::*;
use speedwatch::storage::Repository;

use common::{at, FixedClock, ScriptedSource, SharedBuffer, TestMeasurementBuilder};

struct Setup {
    _dir: tempfile::TempDir,
    repository: SqliteRepository,
    clock: Arc<FixedClock>,
    output: SharedBuffer,
}

impl Setup {
    fn new(now: chrono::NaiveDateTime) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = FixedClock::new(now);
        let repository =
            SqliteRepository::open_with_clock(dir.path().join("speedwatch.db"), clock.clone()).unwrap();
        Self {
            _dir: dir,
            repository,
            clock,
            output: SharedBuffer::default(),
        }
    }

    fn handle(&self, source: Arc<ScriptedSource>) -> SchedulerHandle {
        let reporter = Arc::new(Reporter::new(50, false, self.output.clone()));
        let scheduler = Scheduler::new(Arc::new(self.repository.clone()), source, reporter)
            .with_clock(self.clock.clone());
        SchedulerHandle::new(scheduler)
    }

    async fn stored(&self) -> Vec<Measurement> {
        self.repository
            .list_all()
            .map(|r| r.unwrap())
            .collect()
            .await
    }
}

#[tokio::test]
async fn test_first_start_catches_up_once_per_hour() {
    let setup = Setup::new(at(10, 11, 15));
    let taken = TestMeasurementBuilder::new(at(10, 11, 15)).download_mbits(93).build();
    let source = Arc::new(ScriptedSource::new().then_ok(taken.clone()));

    let mut handle = setup.handle(source.clone());
    let summary = handle.start().await.unwrap();
    assert!(summary.caught_up);
    assert_eq!(summary.first_due, std::time::Duration::from_secs(105 * 60));
    assert_eq!(source.calls(), 1);
    handle.dispose().await.unwrap();

    assert_eq!(setup.stored().await, vec![taken]);
    assert_eq!(
        setup.output.lines(),
        vec!["[10.05.24 11:15] Download: 93.00 Upload: 100.00".to_string()]
    );

    // A restart later in the same hour finds the record: no synchronous
    // catch-up, the timer is armed to fire right away.
    setup.clock.set(at(10, 11, 40));
    let second_source = Arc::new(ScriptedSource::new());
    let mut handle = setup.handle(second_source.clone());
    let summary = handle.start().await.unwrap();
    assert!(!summary.caught_up);
    assert_eq!(summary.first_due, std::time::Duration::ZERO);
    assert_eq!(summary.days.len(), 1);
    handle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_failed_catch_up_leaves_storage_untouched() {
    let setup = Setup::new(at(10, 11, 15));
    let source = Arc::new(ScriptedSource::new().then_err(MeasurementError::Malformed("unexpected token".to_string())));

    let mut handle = setup.handle(source.clone());
    let summary = handle.start().await.unwrap();
    assert!(summary.caught_up);
    assert_eq!(handle.state(), SchedulerState::Armed);
    handle.stop();
    handle.stop();
    handle.dispose().await.unwrap();

    assert!(setup.stored().await.is_empty());
    assert!(setup.output.lines().is_empty());
}

#[tokio::test]
async fn test_startup_report_from_sqlite() {
    let setup = Setup::new(at(10, 11, 30));
    let records = [
        TestMeasurementBuilder::new(at(9, 8, 0)).download_mbits(40).upload_mbits(70).build(),
        TestMeasurementBuilder::new(at(9, 20, 0)).download_mbits(45).upload_mbits(90).build(),
        TestMeasurementBuilder::new(at(10, 11, 2)).download_mbits(60).upload_mbits(55).build(),
    ];
    for record in &records {
        setup.repository.write(record).await.unwrap();
    }

    let mut handle = setup.handle(Arc::new(ScriptedSource::new()));
    let summary = handle.start().await.unwrap();
    handle.dispose().await.unwrap();

    assert!(!summary.caught_up);
    assert_eq!(
        setup.output.lines(),
        vec![
            "[09.05.24] Download: 45.00 Upload: 90.00 [below threshold]".to_string(),
            "[10.05.24] Download: 60.00 Upload: 55.00".to_string(),
        ]
    );
    assert_eq!(summary.days[0].samples, 2);
}

#[tokio::test]
async fn test_manual_cycle_records_and_reports_duplicates() {
    let setup = Setup::new(at(10, 11, 15));
    let taken = TestMeasurementBuilder::new(at(10, 11, 15)).build();
    let source = Arc::new(ScriptedSource::new().then_ok(taken.clone()).then_ok(taken.clone()));
    let handle = setup.handle(source);

    let first = handle.scheduler().run_cycle().await;
    assert!(first.is_recorded());

    let second = handle.scheduler().run_cycle().await;
    assert!(matches!(
        second,
        CycleOutcome::StorageFailed {
            error: StorageError::DuplicateId(_),
            ..
        }
    ));
    assert_eq!(setup.stored().await.len(), 1);
}
