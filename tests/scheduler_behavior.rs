//! Scheduling semantics: independent intervals, failure isolation, --once.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use quarry_core::error::FetchError;
use quarry_core::record::{RawRecord, SourceKind};
use quarry_core::schema::RecordSchema;
use quarry_core::scrapers::{CycleOutcome, Scraper, TargetFailure};
use quarry_core::timestamp::UtcDateTime;
use quarry_daemon::pipeline::Pipeline;
use quarry_daemon::scheduler::Scheduler;
use quarry_tests::{sqlite_url, temp_warehouse};

/// How a [`CountingScraper`] cycle ends.
enum CycleMode {
    EmitRecord,
    FailTarget,
    Panic,
}

/// Scraper double that counts its cycles, then emits one valid record,
/// fails its single target, or panics outright.
struct CountingScraper {
    source: SourceKind,
    interval: Duration,
    cycles: AtomicUsize,
    mode: CycleMode,
}

impl CountingScraper {
    fn with_mode(source: SourceKind, interval: Duration, mode: CycleMode) -> Arc<Self> {
        Arc::new(Self {
            source,
            interval,
            cycles: AtomicUsize::new(0),
            mode,
        })
    }

    fn good(source: SourceKind, interval: Duration) -> Arc<Self> {
        Self::with_mode(source, interval, CycleMode::EmitRecord)
    }

    fn failing(source: SourceKind, interval: Duration) -> Arc<Self> {
        Self::with_mode(source, interval, CycleMode::FailTarget)
    }

    fn panicking(source: SourceKind, interval: Duration) -> Arc<Self> {
        Self::with_mode(source, interval, CycleMode::Panic)
    }

    fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl Scraper for CountingScraper {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn schema(&self) -> RecordSchema {
        match self.source {
            SourceKind::Stock => RecordSchema::stock(),
            SourceKind::Weather => RecordSchema::weather(),
        }
    }

    fn run_cycle<'a>(&'a self) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + 'a>> {
        Box::pin(async move {
            let cycle = self.cycles.fetch_add(1, Ordering::SeqCst);
            let mut outcome = CycleOutcome::default();
            match self.mode {
                CycleMode::Panic => panic!("scraper blew up mid-cycle"),
                CycleMode::FailTarget => {
                    outcome.failures.push(TargetFailure {
                        target: String::from("https://dead.example/"),
                        error: FetchError::Status { code: 500 },
                    });
                }
                CycleMode::EmitRecord => {
                    // Distinct symbol per cycle keeps the natural keys apart even
                    // when two cycles land within the same timestamp precision.
                    outcome.records.push(
                        RawRecord::new(self.source, "https://finance.example/quote/TICK", UtcDateTime::now())
                            .with_text("symbol", format!("T{cycle}"))
                            .with_text("price", "150.23"),
                    );
                }
            }
            outcome
        })
    }
}

async fn run_for(scheduler: Arc<Scheduler>, duration: Duration) {
    let (tx, rx) = watch::channel(false);
    let runner = tokio::spawn(scheduler.run(rx));
    tokio::time::sleep(duration).await;
    tx.send(true).unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn run_once_runs_every_scraper_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(temp_warehouse(&sqlite_url(dir.path()), 100).await);
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&warehouse)));

    let first = CountingScraper::good(SourceKind::Stock, Duration::from_secs(3600));
    let second = CountingScraper::failing(SourceKind::Weather, Duration::from_secs(7200));
    let scrapers: Vec<Arc<dyn Scraper>> = vec![first.clone(), second.clone()];
    let scheduler = Scheduler::new(pipeline, scrapers);

    scheduler.run_once().await;
    assert_eq!(first.cycles(), 1);
    assert_eq!(second.cycles(), 1);
    assert_eq!(warehouse.count(SourceKind::Stock).await.unwrap(), 1);
}

#[tokio::test]
async fn each_scraper_keeps_its_own_interval() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(temp_warehouse(&sqlite_url(dir.path()), 100).await);
    let pipeline = Arc::new(Pipeline::new(warehouse));

    let fast = CountingScraper::good(SourceKind::Stock, Duration::from_millis(25));
    let slow = CountingScraper::good(SourceKind::Weather, Duration::from_millis(400));
    let scrapers: Vec<Arc<dyn Scraper>> = vec![fast.clone(), slow.clone()];
    let scheduler = Arc::new(Scheduler::new(pipeline, scrapers));

    run_for(scheduler, Duration::from_millis(300)).await;

    // Both fire immediately; only the fast one gets further ticks in.
    assert!(fast.cycles() >= 4, "fast ran {} cycles", fast.cycles());
    assert!(slow.cycles() >= 1);
    assert!(fast.cycles() > slow.cycles());
}

#[tokio::test]
async fn a_panicking_cycle_does_not_kill_the_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(temp_warehouse(&sqlite_url(dir.path()), 100).await);
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&warehouse)));

    let explosive = CountingScraper::panicking(SourceKind::Weather, Duration::from_millis(25));
    let healthy = CountingScraper::good(SourceKind::Stock, Duration::from_millis(25));
    let scrapers: Vec<Arc<dyn Scraper>> = vec![explosive.clone(), healthy.clone()];
    let scheduler = Arc::new(Scheduler::new(pipeline, scrapers));

    run_for(scheduler, Duration::from_millis(200)).await;

    // Later ticks still fire for the source whose first cycle panicked.
    assert!(explosive.cycles() >= 2, "panicking scraper ran {} cycles", explosive.cycles());
    assert!(healthy.cycles() >= 2);
    assert!(warehouse.count(SourceKind::Stock).await.unwrap() >= 2);
}

#[tokio::test]
async fn a_failing_scraper_never_blocks_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let warehouse = Arc::new(temp_warehouse(&sqlite_url(dir.path()), 100).await);
    let pipeline = Arc::new(Pipeline::new(Arc::clone(&warehouse)));

    let broken = CountingScraper::failing(SourceKind::Weather, Duration::from_millis(25));
    let healthy = CountingScraper::good(SourceKind::Stock, Duration::from_millis(25));
    let scrapers: Vec<Arc<dyn Scraper>> = vec![broken.clone(), healthy.clone()];
    let scheduler = Arc::new(Scheduler::new(pipeline, scrapers));

    run_for(scheduler, Duration::from_millis(200)).await;

    assert!(broken.cycles() >= 2);
    assert!(healthy.cycles() >= 2);
    assert!(warehouse.count(SourceKind::Stock).await.unwrap() >= 2);
    assert_eq!(warehouse.count(SourceKind::Weather).await.unwrap(), 0);
}
