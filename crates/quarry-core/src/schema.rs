//! Declarative validation schemas, one per source kind.

use std::collections::BTreeMap;

/// Canonical type a field must coerce to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Decimal,
    Integer,
    Text,
    Timestamp,
}

/// Validation rule for one logical field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub field_type: FieldType,
    pub required: bool,
    /// Inclusive numeric bounds, checked after coercion.
    pub range: Option<(f64, f64)>,
    /// Maximum length for text fields.
    pub max_len: Option<usize>,
    /// Closed set of accepted text values.
    pub one_of: Option<Vec<String>>,
}

impl FieldRule {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            range: None,
            max_len: None,
            one_of: None,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(field_type)
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn with_one_of(mut self, values: Vec<String>) -> Self {
        self.one_of = Some(values);
        self
    }
}

/// Schema for one record shape: per-field rules plus the fields that make up
/// the natural key (the fetch timestamp is always appended to the key).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub fields: BTreeMap<String, FieldRule>,
    pub key_fields: Vec<String>,
}

impl RecordSchema {
    pub fn new(fields: BTreeMap<String, FieldRule>, key_fields: Vec<String>) -> Self {
        Self { fields, key_fields }
    }

    /// Rules for a stock quote scraped off a quote page.
    pub fn stock() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            String::from("symbol"),
            FieldRule::required(FieldType::Text).with_max_len(10),
        );
        fields.insert(
            String::from("price"),
            FieldRule::required(FieldType::Decimal).with_range(f64::MIN_POSITIVE, f64::MAX),
        );
        fields.insert(
            String::from("change"),
            FieldRule::optional(FieldType::Decimal),
        );
        fields.insert(
            String::from("change_percent"),
            FieldRule::optional(FieldType::Decimal),
        );
        fields.insert(
            String::from("volume"),
            FieldRule::optional(FieldType::Integer).with_range(0.0, f64::MAX),
        );
        fields.insert(
            String::from("scrape_url"),
            FieldRule::optional(FieldType::Text).with_max_len(255),
        );
        Self::new(fields, vec![String::from("symbol")])
    }

    /// Rules for a weather reading from the conditions API.
    pub fn weather() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            String::from("city_name"),
            FieldRule::required(FieldType::Text).with_max_len(100),
        );
        fields.insert(
            String::from("city_id"),
            FieldRule::required(FieldType::Integer),
        );
        fields.insert(
            String::from("temperature"),
            FieldRule::required(FieldType::Decimal).with_range(-100.0, 100.0),
        );
        fields.insert(
            String::from("feels_like"),
            FieldRule::optional(FieldType::Decimal),
        );
        fields.insert(
            String::from("humidity"),
            FieldRule::optional(FieldType::Decimal).with_range(0.0, 100.0),
        );
        fields.insert(
            String::from("pressure"),
            FieldRule::optional(FieldType::Decimal),
        );
        fields.insert(
            String::from("wind_speed"),
            FieldRule::optional(FieldType::Decimal).with_range(0.0, f64::MAX),
        );
        fields.insert(
            String::from("wind_direction"),
            FieldRule::optional(FieldType::Integer).with_range(0.0, 360.0),
        );
        fields.insert(
            String::from("cloudiness"),
            FieldRule::optional(FieldType::Decimal).with_range(0.0, 100.0),
        );
        fields.insert(
            String::from("weather_condition"),
            FieldRule::optional(FieldType::Text).with_max_len(100),
        );
        fields.insert(
            String::from("weather_description"),
            FieldRule::optional(FieldType::Text),
        );
        Self::new(fields, vec![String::from("city_id")])
    }
}
