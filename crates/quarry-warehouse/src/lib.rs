//! Idempotent relational persistence for validated records.
//!
//! The warehouse speaks `sqlx::Any`, so the same SQL runs against PostgreSQL
//! in production and SQLite in tests. Records are written in batches, each
//! batch inside one transaction; a natural-key conflict is silently skipped
//! so replaying a cycle never duplicates observations.

pub mod error;
pub mod tables;

use std::sync::Once;
use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, error, info};

use quarry_core::config::DatabaseConfig;
use quarry_core::record::{FieldValue, SourceKind, ValidatedRecord};
use quarry_core::retry::{retry_with, RetryPolicy};
use quarry_core::timestamp::UtcDateTime;

pub use error::WarehouseError;
pub use tables::{Column, ColumnType, TableSpec};

type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;

static INSTALL_DRIVERS: Once = Once::new();

/// What happened to one `store` call's worth of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreReport {
    /// Rows actually inserted.
    pub stored: usize,
    /// Rows skipped because their natural key was already present.
    pub duplicates: usize,
    /// Rows lost because their batch failed and rolled back.
    pub failed: usize,
}

/// Outcome recorded in the run audit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// One scraper cycle's audit row.
#[derive(Debug, Clone)]
pub struct RunLog {
    pub source: SourceKind,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub status: RunStatus,
    pub fetched: i64,
    pub stored: i64,
    pub rejected: i64,
    pub duplicates: i64,
    pub failures: i64,
    pub detail: Option<String>,
}

pub struct Warehouse {
    pool: AnyPool,
    batch_size: usize,
    retry: RetryPolicy,
}

impl Warehouse {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, WarehouseError> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
        let url = config.url();
        // A pooled in-memory SQLite database is one database per connection;
        // keep a single connection so the schema stays visible.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .map_err(WarehouseError::Connect)?;
        Ok(Self {
            pool,
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy::fixed(config.retry_delay(), config.retry_attempts),
        })
    }

    /// Create every table that does not exist yet.
    pub async fn init_schema(&self) -> Result<(), WarehouseError> {
        for spec in TableSpec::all() {
            sqlx::query(&spec.create_sql())
                .execute(&self.pool)
                .await
                .map_err(|e| WarehouseError::Schema {
                    table: spec.name,
                    source: e,
                })?;
        }
        info!("warehouse schema ready");
        Ok(())
    }

    /// Persist validated records, batched per source table.
    ///
    /// Each batch commits or rolls back as a unit. A failed batch is retried
    /// within the configured budget when the error looks transient; records
    /// in a batch that never commits are counted as `failed`, and later
    /// batches still run.
    pub async fn store(&self, records: &[ValidatedRecord]) -> StoreReport {
        let mut report = StoreReport::default();
        for kind in SourceKind::ALL {
            let group: Vec<&ValidatedRecord> =
                records.iter().filter(|r| r.source == kind).collect();
            if group.is_empty() {
                continue;
            }
            let spec = TableSpec::for_source(kind);
            for chunk in group.chunks(self.batch_size) {
                let attempt = retry_with(self.retry, WarehouseError::is_transient, || {
                    self.insert_batch(&spec, chunk)
                })
                .await;
                match attempt {
                    Ok((stored, duplicates)) => {
                        debug!(table = spec.name, stored, duplicates, "batch committed");
                        report.stored += stored;
                        report.duplicates += duplicates;
                    }
                    Err(e) => {
                        error!(table = spec.name, records = chunk.len(), error = %e, "batch failed");
                        report.failed += chunk.len();
                    }
                }
            }
        }
        report
    }

    async fn insert_batch(
        &self,
        spec: &TableSpec,
        records: &[&ValidatedRecord],
    ) -> Result<(usize, usize), WarehouseError> {
        let sql = spec.insert_sql();
        let mut tx = self.pool.begin().await?;
        let mut stored = 0;
        let mut duplicates = 0;
        for record in records {
            let done = bind_record(sqlx::query(&sql), spec, record)
                .execute(&mut *tx)
                .await?;
            if done.rows_affected() == 0 {
                duplicates += 1;
            } else {
                stored += 1;
            }
        }
        tx.commit().await?;
        Ok((stored, duplicates))
    }

    /// Append one cycle's audit row. Failures here are the caller's to log;
    /// they must not fail the cycle.
    pub async fn log_run(&self, run: &RunLog) -> Result<(), WarehouseError> {
        let sql = TableSpec::scrape_runs().insert_sql();
        sqlx::query(&sql)
            .bind(run.source.as_str())
            .bind(run.started_at.format_rfc3339())
            .bind(run.finished_at.format_rfc3339())
            .bind(run.status.as_str())
            .bind(run.fetched)
            .bind(run.stored)
            .bind(run.rejected)
            .bind(run.duplicates)
            .bind(run.failures)
            .bind(run.detail.clone())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Row count for one source's table.
    pub async fn count(&self, source: SourceKind) -> Result<i64, WarehouseError> {
        let sql = format!("SELECT COUNT(*) FROM {}", source.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Audit rows recorded for one source, newest last.
    pub async fn run_count(&self, source: SourceKind) -> Result<i64, WarehouseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scrape_runs WHERE source = $1")
            .bind(source.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn bind_record<'q>(
    mut query: AnyQuery<'q>,
    spec: &TableSpec,
    record: &ValidatedRecord,
) -> AnyQuery<'q> {
    for column in &spec.columns {
        query = match (column.name, column.column_type) {
            ("fetched_at", _) => query.bind(record.fetched_at.format_rfc3339()),
            (name, ColumnType::Double) => {
                query.bind(record.field(name).and_then(FieldValue::as_f64))
            }
            (name, ColumnType::BigInt) => query.bind(integer_of(record.field(name))),
            (name, ColumnType::Text) => query.bind(text_of(record.field(name))),
        };
    }
    query
}

fn integer_of(value: Option<&FieldValue>) -> Option<i64> {
    match value? {
        FieldValue::Integer(value) => Some(*value),
        FieldValue::Decimal(value) if value.fract() == 0.0 => Some(*value as i64),
        _ => None,
    }
}

fn text_of(value: Option<&FieldValue>) -> Option<String> {
    match value? {
        FieldValue::Text(value) => Some(value.clone()),
        FieldValue::Timestamp(value) => Some(value.format_rfc3339()),
        FieldValue::Decimal(value) => Some(value.to_string()),
        FieldValue::Integer(value) => Some(value.to_string()),
    }
}
