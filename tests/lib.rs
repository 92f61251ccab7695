//! Shared doubles and fixtures for the behavioral test suites.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;

use quarry_core::config::DatabaseConfig;
use quarry_core::error::FetchError;
use quarry_core::http_client::{HttpClient, HttpRequest, HttpResponse};
use quarry_core::record::{FieldValue, NaturalKey, SourceKind, ValidatedRecord};
use quarry_core::timestamp::UtcDateTime;
use quarry_warehouse::Warehouse;

/// HTTP double driven by a per-URL script of responses.
///
/// Each fetch consumes the next scripted result for its URL; an exhausted or
/// unknown URL yields 404. Calls are recorded for assertions.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<HttpResponse, FetchError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, url: &str, result: Result<HttpResponse, FetchError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result);
    }

    /// Script the same successful body for every fetch of `url`.
    pub fn always_ok(&self, url: &str, body: &str, times: usize) {
        for _ in 0..times {
            self.enqueue(url, Ok(HttpResponse::ok(body)));
        }
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }
}

impl HttpClient for ScriptedClient {
    fn fetch<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, FetchError>> + Send + 'a>> {
        self.calls.lock().unwrap().push(request.url.clone());
        let result = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(FetchError::Status { code: 404 }));
        Box::pin(async move { result })
    }
}

/// SQLite file URL inside a test-owned directory.
pub fn sqlite_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("quarry.db").display())
}

/// Connected warehouse with initialized schema, batching at `batch_size`.
pub async fn temp_warehouse(url: &str, batch_size: usize) -> Warehouse {
    let config = DatabaseConfig {
        url: Some(url.to_string()),
        batch_size,
        retry_attempts: 1,
        retry_delay_seconds: 0,
        ..DatabaseConfig::default()
    };
    let warehouse = Warehouse::connect(&config).await.expect("connect");
    warehouse.init_schema().await.expect("schema");
    warehouse
}

/// Hand-built stock record, bypassing validation so storage behavior can be
/// probed with values the validator would never let through.
pub fn stock_record(symbol: &str, price: f64, fetched_at: &str) -> ValidatedRecord {
    let fetched_at = UtcDateTime::parse(fetched_at).expect("test timestamp");
    let mut fields = BTreeMap::new();
    fields.insert(String::from("symbol"), FieldValue::Text(symbol.to_string()));
    fields.insert(String::from("price"), FieldValue::Decimal(price));
    ValidatedRecord {
        source: SourceKind::Stock,
        natural_key: NaturalKey::new(vec![
            symbol.to_string(),
            fetched_at.format_rfc3339(),
        ])
        .expect("non-empty key"),
        fetched_at,
        fields,
    }
}

pub fn weather_record(city_id: i64, temperature: f64, fetched_at: &str) -> ValidatedRecord {
    let fetched_at = UtcDateTime::parse(fetched_at).expect("test timestamp");
    let mut fields = BTreeMap::new();
    fields.insert(String::from("city_id"), FieldValue::Integer(city_id));
    fields.insert(
        String::from("city_name"),
        FieldValue::Text(String::from("Testville")),
    );
    fields.insert(
        String::from("temperature"),
        FieldValue::Decimal(temperature),
    );
    ValidatedRecord {
        source: SourceKind::Weather,
        natural_key: NaturalKey::new(vec![
            city_id.to_string(),
            fetched_at.format_rfc3339(),
        ])
        .expect("non-empty key"),
        fetched_at,
        fields,
    }
}
