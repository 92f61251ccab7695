use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RejectionReason;
use crate::timestamp::UtcDateTime;

/// Canonical source identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Stock,
    Weather,
}

impl SourceKind {
    pub const ALL: [Self; 2] = [Self::Stock, Self::Weather];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Weather => "weather",
        }
    }

    /// Warehouse table this source's records land in.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Stock => "stock_quotes",
            Self::Weather => "weather_readings",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(Self::Stock),
            "weather" => Ok(Self::Weather),
            other => Err(format!("unknown source '{other}', expected stock or weather")),
        }
    }
}

/// A field value as extracted from a response body, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
}

impl RawValue {
    /// Lossless-enough rendering for rejection diagnostics.
    pub fn display(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Number(value) => value.to_string(),
        }
    }
}

/// One successfully fetched, not-yet-validated observation.
///
/// A field absent from `fields` means extraction failed for it; the record
/// still flows to the validator so missing-field rejection happens in one
/// place.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub source: SourceKind,
    /// The scrape target this came from (URL or city name).
    pub target: String,
    pub fetched_at: UtcDateTime,
    pub fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(source: SourceKind, target: impl Into<String>, fetched_at: UtcDateTime) -> Self {
        Self {
            source,
            target: target.into(),
            fetched_at,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_field(name, RawValue::Text(value.into()))
    }

    pub fn with_number(self, name: impl Into<String>, value: f64) -> Self {
        self.with_field(name, RawValue::Number(value))
    }
}

/// A field value coerced to its canonical type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Decimal(f64),
    Integer(i64),
    Text(String),
    Timestamp(UtcDateTime),
}

impl FieldValue {
    /// Numeric view used for range checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Decimal(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            Self::Text(_) | Self::Timestamp(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// Ordered parts identifying one logical observation.
///
/// Two records with equal natural keys are the same observation; the
/// warehouse inserts the first and ignores the rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    parts: Vec<String>,
}

impl NaturalKey {
    /// Build a key from its parts. Empty part lists are not a key.
    pub fn new(parts: Vec<String>) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }
}

impl Display for NaturalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.parts.join("/"))
    }
}

/// A record that passed validation, carrying coerced fields and the natural
/// key used for idempotent storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub source: SourceKind,
    pub natural_key: NaturalKey,
    pub fetched_at: UtcDateTime,
    pub fields: BTreeMap<String, FieldValue>,
}

impl ValidatedRecord {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// A record that failed validation, with every collected reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub raw: RawRecord,
    pub reasons: Vec<RejectionReason>,
}

impl RejectedRecord {
    pub fn reason_summary(&self) -> String {
        self.reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
