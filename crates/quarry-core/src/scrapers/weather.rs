//! Weather scraper: queries the current-conditions JSON API per city and
//! pulls fields out with fixed key paths.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{CityConfig, WeatherSourceConfig};
use crate::error::{ConfigError, FetchError};
use crate::extract::{ExtractRule, FieldExtractor};
use crate::http_client::{HttpClient, HttpRequest};
use crate::record::{RawRecord, SourceKind};
use crate::retry::RetryPolicy;
use crate::schema::RecordSchema;
use crate::throttle::Throttle;
use crate::timestamp::UtcDateTime;

use super::{fetch_with_retry, CycleOutcome, Scraper, TargetFailure};

pub struct WeatherScraper {
    client: Arc<dyn HttpClient>,
    config: WeatherSourceConfig,
    extractor: FieldExtractor,
    throttle: Throttle,
    retry: RetryPolicy,
}

/// Key paths into the conditions API response body.
fn reading_rules() -> BTreeMap<String, ExtractRule> {
    [
        ("temperature", "main.temp"),
        ("feels_like", "main.feels_like"),
        ("humidity", "main.humidity"),
        ("pressure", "main.pressure"),
        ("wind_speed", "wind.speed"),
        ("wind_direction", "wind.deg"),
        ("cloudiness", "clouds.all"),
        ("weather_condition", "weather[0].main"),
        ("weather_description", "weather[0].description"),
    ]
    .into_iter()
    .map(|(field, path)| (field.to_string(), ExtractRule::JsonPath(path.to_string())))
    .collect()
}

impl WeatherScraper {
    pub fn new(
        config: WeatherSourceConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self {
            client,
            config,
            extractor: FieldExtractor::new(reading_rules()),
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

    fn request_for(&self, city: &CityConfig) -> HttpRequest {
        let mut request = HttpRequest::get(&self.config.base_url)
            .with_timeout(self.config.timeout())
            .with_query("id", city.id.to_string())
            .with_query("appid", &self.config.api_key);
        for (name, value) in &self.config.params {
            request = request.with_query(name, value);
        }
        request
    }

    async fn scrape_city(&self, city: &CityConfig) -> Result<RawRecord, TargetFailure> {
        self.throttle.acquire().await;
        let failure = |error| TargetFailure {
            target: city.name.clone(),
            error,
        };

        let response =
            fetch_with_retry(self.client.as_ref(), self.retry, self.request_for(city))
                .await
                .map_err(failure)?;

        let document: Value = serde_json::from_str(&response.body).map_err(|e| {
            failure(FetchError::Parse {
                detail: format!("response is not JSON: {e}"),
            })
        })?;
        check_api_status(&document).map_err(failure)?;

        let extraction = self.extractor.extract_json(&document);
        for (field, error) in &extraction.failures {
            warn!(city = %city.name, field = %field, error = %error, "field extraction failed");
        }

        let mut record = RawRecord::new(SourceKind::Weather, &city.name, UtcDateTime::now())
            .with_text("city_name", &city.name)
            .with_number("city_id", city.id as f64);
        for (field, value) in extraction.fields {
            record.fields.insert(field, value);
        }
        debug!(city = %city.name, fields = record.fields.len(), "scraped conditions");
        Ok(record)
    }
}

/// The API reports its own errors in-band via a `cod` field that is a number
/// on success and often a string on failure.
fn check_api_status(document: &Value) -> Result<(), FetchError> {
    let code = match document.get("cod") {
        None => return Ok(()),
        Some(Value::Number(number)) => number.as_i64().unwrap_or(0),
        Some(Value::String(text)) => text.parse().unwrap_or(0),
        Some(_) => 0,
    };
    if code == 200 {
        return Ok(());
    }
    let message = document
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    Err(FetchError::Parse {
        detail: format!("api reported status {code}: {message}"),
    })
}

impl Scraper for WeatherScraper {
    fn source(&self) -> SourceKind {
        SourceKind::Weather
    }

    fn interval(&self) -> Duration {
        self.config.interval()
    }

    fn schema(&self) -> RecordSchema {
        RecordSchema::weather()
    }

    fn run_cycle<'a>(&'a self) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + 'a>> {
        Box::pin(async move {
            let mut outcome = CycleOutcome::default();
            for city in &self.config.cities {
                match self.scrape_city(city).await {
                    Ok(record) => outcome.records.push(record),
                    Err(failure) => {
                        if failure.error.is_transient() {
                            warn!(city = %failure.target, error = %failure.error, "weather target failed, next cycle retries");
                        } else {
                            error!(city = %failure.target, error = %failure.error, "weather target failed permanently");
                        }
                        outcome.failures.push(failure);
                    }
                }
            }
            outcome
        })
    }
}
