//! One scrape cycle end to end: fetch, validate, store, audit.

use std::sync::Arc;

use tracing::{info, warn};

use quarry_core::scrapers::Scraper;
use quarry_core::timestamp::UtcDateTime;
use quarry_core::validator::validate;
use quarry_core::{SourceKind, ValidatedRecord};
use quarry_warehouse::{RunLog, RunStatus, Warehouse};

/// What one cycle did, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub source: SourceKind,
    pub status: RunStatus,
    /// Raw records fetched and extracted.
    pub fetched: usize,
    /// Targets that produced no record.
    pub failed_targets: usize,
    pub rejected: usize,
    pub stored: usize,
    pub duplicates: usize,
    /// Validated records lost to failed storage batches.
    pub failed_rows: usize,
}

pub struct Pipeline {
    warehouse: Arc<Warehouse>,
}

impl Pipeline {
    pub fn new(warehouse: Arc<Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Run one scraper cycle. Never fails: every problem is reported in the
    /// cycle report and the audit row so the next cycle starts clean.
    pub async fn run_cycle(&self, scraper: &dyn Scraper) -> CycleReport {
        let source = scraper.source();
        let started_at = UtcDateTime::now();
        let outcome = scraper.run_cycle().await;
        let fetched = outcome.records.len();
        let failed_targets = outcome.failures.len();

        let schema = scraper.schema();
        let mut validated: Vec<ValidatedRecord> = Vec::with_capacity(fetched);
        let mut rejected = 0usize;
        for raw in outcome.records {
            match validate(raw, &schema) {
                Ok(record) => validated.push(record),
                Err(rejection) => {
                    warn!(
                        source = %source,
                        target = %rejection.raw.target,
                        reasons = %rejection.reason_summary(),
                        "record rejected"
                    );
                    rejected += 1;
                }
            }
        }

        let store = self.warehouse.store(&validated).await;
        let finished_at = UtcDateTime::now();

        let clean = failed_targets == 0 && rejected == 0 && store.failed == 0;
        let status = if clean {
            RunStatus::Success
        } else if store.stored > 0 || store.duplicates > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };

        let run = RunLog {
            source,
            started_at,
            finished_at,
            status,
            fetched: fetched as i64,
            stored: store.stored as i64,
            rejected: rejected as i64,
            duplicates: store.duplicates as i64,
            failures: (failed_targets + store.failed) as i64,
            detail: None,
        };
        // The audit row is best effort; a dead audit table must not take the
        // data tables down with it.
        if let Err(e) = self.warehouse.log_run(&run).await {
            warn!(source = %source, error = %e, "run audit insert failed");
        }

        info!(
            source = %source,
            status = status.as_str(),
            fetched,
            rejected,
            stored = store.stored,
            duplicates = store.duplicates,
            failed_targets,
            failed_rows = store.failed,
            "cycle finished"
        );

        CycleReport {
            source,
            status,
            fetched,
            failed_targets,
            rejected,
            stored: store.stored,
            duplicates: store.duplicates,
            failed_rows: store.failed,
        }
    }
}
