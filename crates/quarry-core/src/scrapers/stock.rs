//! Stock quote scraper: fetches quote pages over HTTP and pulls fields out
//! of the HTML with configured CSS selectors.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::config::StockSourceConfig;
use crate::error::ConfigError;
use crate::extract::{ExtractRule, FieldExtractor};
use crate::http_client::{HttpClient, HttpRequest};
use crate::record::{RawRecord, RawValue, SourceKind};
use crate::retry::RetryPolicy;
use crate::schema::RecordSchema;
use crate::throttle::Throttle;
use crate::timestamp::UtcDateTime;

use super::{fetch_with_retry, CycleOutcome, Scraper, TargetFailure};

pub struct StockScraper {
    client: Arc<dyn HttpClient>,
    config: StockSourceConfig,
    extractor: FieldExtractor,
    throttle: Throttle,
    retry: RetryPolicy,
}

impl StockScraper {
    /// Build a scraper from its config section. Selector typos fail here,
    /// not mid-cycle.
    pub fn new(config: StockSourceConfig, client: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        config.check()?;
        let rules = config
            .selectors
            .iter()
            .map(|(field, selector)| (field.clone(), ExtractRule::Css(selector.clone())))
            .collect();
        Ok(Self {
            client,
            config,
            extractor: FieldExtractor::new(rules),
            throttle: Throttle::per_second(),
            retry: RetryPolicy::exponential(3),
        })
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request_for(&self, url: &str) -> HttpRequest {
        let mut request = HttpRequest::get(url).with_timeout(self.config.timeout());
        for (name, value) in &self.config.headers {
            request = request.with_header(name, value);
        }
        request
    }

    async fn scrape_target(&self, url: &str) -> Result<RawRecord, TargetFailure> {
        self.throttle.acquire().await;
        let response = fetch_with_retry(self.client.as_ref(), self.retry, self.request_for(url))
            .await
            .map_err(|error| TargetFailure {
                target: url.to_string(),
                error,
            })?;

        let extraction = self.extractor.extract_html(&response.body);
        for (field, error) in &extraction.failures {
            warn!(target_url = url, field = %field, error = %error, "field extraction failed");
        }

        let mut record = RawRecord::new(SourceKind::Stock, url, UtcDateTime::now())
            .with_text("scrape_url", url);
        if let Some(symbol) = symbol_from_url(url) {
            record = record.with_text("symbol", symbol);
        }
        for (field, value) in extraction.fields {
            record.fields.insert(field, value);
        }
        debug!(target_url = url, fields = record.fields.len(), "scraped quote page");
        Ok(record)
    }
}

/// Pull the ticker symbol out of a quote page URL path (`/quote/AAPL`).
fn symbol_from_url(url: &str) -> Option<String> {
    let after = url.split("/quote/").nth(1)?;
    let symbol: String = after
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'))
        .collect();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol.to_ascii_uppercase())
    }
}

impl Scraper for StockScraper {
    fn source(&self) -> SourceKind {
        SourceKind::Stock
    }

    fn interval(&self) -> Duration {
        self.config.interval()
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::stock()
    }

    fn run_cycle<'a>(&'a self) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + 'a>> {
        Box::pin(async move {
            let mut outcome = CycleOutcome::default();
            for url in &self.config.urls {
                match self.scrape_target(url).await {
                    Ok(record) => outcome.records.push(record),
                    Err(failure) => {
                        if failure.error.is_transient() {
                            warn!(target_url = %failure.target, error = %failure.error, "stock target failed, next cycle retries");
                        } else {
                            error!(target_url = %failure.target, error = %failure.error, "stock target failed permanently");
                        }
                        outcome.failures.push(failure);
                    }
                }
            }
            outcome
        })
    }
}
