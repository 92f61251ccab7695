//! Core contracts for quarry.
//!
//! This crate contains:
//! - Raw/validated/rejected record types and natural keys
//! - The HTTP source client contract and its reqwest implementation
//! - Field extraction rules (CSS selectors, JSON key paths)
//! - Validation schemas and the aggregate-all-failures validator
//! - Retry/backoff and per-source throttling policies
//! - YAML + environment configuration

pub mod config;
pub mod error;
pub mod extract;
pub mod http_client;
pub mod record;
pub mod retry;
pub mod schema;
pub mod scrapers;
pub mod throttle;
pub mod timestamp;
pub mod validator;

pub use config::{
    AppConfig, CityConfig, DatabaseConfig, LoggingConfig, StockSourceConfig, WeatherSourceConfig,
};
pub use error::{ConfigError, FetchError, RejectionReason};
pub use extract::{ExtractError, ExtractRule, FieldExtractor};
pub use http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use record::{
    FieldValue, NaturalKey, RawRecord, RawValue, RejectedRecord, SourceKind, ValidatedRecord,
};
pub use retry::{retry_with, Backoff, RetryPolicy};
pub use schema::{FieldRule, FieldType, RecordSchema};
pub use scrapers::{CycleOutcome, Scraper, StockScraper, TargetFailure, WeatherScraper};
pub use throttle::Throttle;
pub use timestamp::UtcDateTime;
pub use validator::validate;
