//! Source scrapers: one cycle fetches every configured target, extracts raw
//! records, and reports per-target failures without aborting the cycle.

mod stock;
mod weather;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::FetchError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::record::{RawRecord, SourceKind};
use crate::retry::{retry_with, RetryPolicy};
use crate::schema::RecordSchema;

pub use stock::StockScraper;
pub use weather::WeatherScraper;

/// One fetch target that produced no record this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub target: String,
    pub error: FetchError,
}

/// Everything one scrape cycle produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    pub records: Vec<RawRecord>,
    pub failures: Vec<TargetFailure>,
}

impl CycleOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.failures.is_empty()
    }
}

/// A periodic source scraper.
///
/// `run_cycle` never fails as a whole: individual targets fail and are
/// reported in the outcome, so one dead URL cannot starve the others.
pub trait Scraper: Send + Sync {
    fn source(&self) -> SourceKind;

    /// How often the scheduler should run this scraper.
    fn interval(&self) -> Duration;

    /// Validation schema for the records this scraper emits.
    fn schema(&self) -> RecordSchema;

    fn run_cycle<'a>(&'a self) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + 'a>>;
}

/// Fetch one target, retrying transient failures within the policy budget.
pub(crate) async fn fetch_with_retry(
    client: &dyn HttpClient,
    policy: RetryPolicy,
    request: HttpRequest,
) -> Result<HttpResponse, FetchError> {
    retry_with(policy, FetchError::is_transient, || {
        client.fetch(request.clone())
    })
    .await
}
