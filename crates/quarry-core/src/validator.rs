//! Record validation: coerce raw fields to canonical types and check every
//! rule, collecting all failures before rejecting.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::RejectionReason;
use crate::record::{FieldValue, NaturalKey, RawRecord, RawValue, RejectedRecord, ValidatedRecord};
use crate::schema::{FieldRule, FieldType, RecordSchema};
use crate::timestamp::UtcDateTime;

/// Validate one raw record against a schema.
///
/// Evaluation is total: every schema field is checked and every failure is
/// collected, so a rejected record reports all of its problems at once.
/// Only required fields can fail a record on coercion; an optional field
/// that renders as `N/A` or empty is dropped and the record stays valid.
pub fn validate(raw: RawRecord, schema: &RecordSchema) -> Result<ValidatedRecord, RejectedRecord> {
    let mut fields = BTreeMap::new();
    let mut reasons = Vec::new();

    for (name, rule) in &schema.fields {
        match raw.fields.get(name) {
            None => {
                if rule.required {
                    reasons.push(RejectionReason::MissingField {
                        field: name.clone(),
                    });
                }
            }
            Some(value) => match coerce(value, rule.field_type) {
                Err(()) => {
                    if rule.required {
                        reasons.push(RejectionReason::TypeCoercion {
                            field: name.clone(),
                            value: value.display(),
                        });
                    } else {
                        warn!(
                            field = %name,
                            value = %value.display(),
                            "unusable optional field dropped"
                        );
                    }
                }
                Ok(coerced) => {
                    if !rule.required && coerced.as_text().is_some_and(str::is_empty) {
                        continue;
                    }
                    check_rule(name, &coerced, rule, &mut reasons);
                    fields.insert(name.clone(), coerced);
                }
            },
        }
    }

    if !reasons.is_empty() {
        return Err(RejectedRecord { raw, reasons });
    }

    let natural_key = natural_key(&fields, schema, raw.fetched_at);
    match natural_key {
        Some(natural_key) => Ok(ValidatedRecord {
            source: raw.source,
            natural_key,
            fetched_at: raw.fetched_at,
            fields,
        }),
        // Key fields are required fields, so an absent key part would have
        // been rejected above already.
        None => Err(RejectedRecord {
            raw,
            reasons: schema
                .key_fields
                .iter()
                .map(|field| RejectionReason::MissingField {
                    field: field.clone(),
                })
                .collect(),
        }),
    }
}

fn natural_key(
    fields: &BTreeMap<String, FieldValue>,
    schema: &RecordSchema,
    fetched_at: UtcDateTime,
) -> Option<NaturalKey> {
    let mut parts = Vec::with_capacity(schema.key_fields.len() + 1);
    for field in &schema.key_fields {
        let part = match fields.get(field)? {
            FieldValue::Text(value) => value.clone(),
            FieldValue::Decimal(value) => value.to_string(),
            FieldValue::Integer(value) => value.to_string(),
            FieldValue::Timestamp(value) => value.format_rfc3339(),
        };
        parts.push(part);
    }
    parts.push(fetched_at.format_rfc3339());
    NaturalKey::new(parts)
}

fn check_rule(
    name: &str,
    value: &FieldValue,
    rule: &FieldRule,
    reasons: &mut Vec<RejectionReason>,
) {
    if let (Some((min, max)), Some(number)) = (rule.range, value.as_f64()) {
        if number < min || number > max {
            reasons.push(RejectionReason::OutOfRange {
                field: name.to_string(),
                value: number.to_string(),
            });
        }
    }

    if let Some(text) = value.as_text() {
        if text.is_empty() || rule.max_len.is_some_and(|max| text.len() > max) {
            reasons.push(RejectionReason::OutOfRange {
                field: name.to_string(),
                value: text.to_string(),
            });
        }
        if let Some(allowed) = &rule.one_of {
            if !allowed.iter().any(|candidate| candidate == text) {
                reasons.push(RejectionReason::NotInEnum {
                    field: name.to_string(),
                    value: text.to_string(),
                });
            }
        }
    }
}

fn coerce(value: &RawValue, field_type: FieldType) -> Result<FieldValue, ()> {
    match field_type {
        FieldType::Decimal => match value {
            RawValue::Number(number) if number.is_finite() => Ok(FieldValue::Decimal(*number)),
            RawValue::Number(_) => Err(()),
            RawValue::Text(text) => parse_numeric(text).map(FieldValue::Decimal),
        },
        FieldType::Integer => {
            let number = match value {
                RawValue::Number(number) => *number,
                RawValue::Text(text) => parse_numeric(text)?,
            };
            if number.is_finite() && number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
                Ok(FieldValue::Integer(number as i64))
            } else {
                Err(())
            }
        }
        FieldType::Text => match value {
            RawValue::Text(text) => Ok(FieldValue::Text(text.trim().to_string())),
            RawValue::Number(_) => Err(()),
        },
        FieldType::Timestamp => match value {
            RawValue::Text(text) => UtcDateTime::parse(text)
                .map(FieldValue::Timestamp)
                .map_err(|_| ()),
            RawValue::Number(number) if number.fract() == 0.0 => {
                UtcDateTime::from_unix(*number as i64)
                    .map(FieldValue::Timestamp)
                    .map_err(|_| ())
            }
            RawValue::Number(_) => Err(()),
        },
    }
}

/// Parse a scraped numeric string the way quote pages render them:
/// `1,234.56`, `+1.5%`, `(2.3)` for negatives. `N/A`, `-` and empty text
/// are coercion failures, not zeros.
fn parse_numeric(text: &str) -> Result<f64, ()> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "N/A" || trimmed == "-" {
        return Err(());
    }

    let (negated, inner) = match trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = inner
        .chars()
        .filter(|c| !matches!(c, '+' | '%' | ','))
        .collect();

    let parsed: f64 = cleaned.trim().parse().map_err(|_| ())?;
    if !parsed.is_finite() {
        return Err(());
    }
    Ok(if negated { -parsed } else { parsed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceKind;

    fn stock_raw(price: &str) -> RawRecord {
        RawRecord::new(
            SourceKind::Stock,
            "https://finance.example/quote/AAPL",
            UtcDateTime::parse("2025-06-01T00:00:00Z").unwrap(),
        )
        .with_text("symbol", "AAPL")
        .with_text("price", price)
        .with_text("change", "1.5")
        .with_text("volume", "1,000,000")
    }

    #[test]
    fn valid_stock_record_coerces_price_to_decimal() {
        let validated = validate(stock_raw("150.23"), &RecordSchema::stock()).expect("valid");
        assert_eq!(validated.field("price"), Some(&FieldValue::Decimal(150.23)));
        assert_eq!(
            validated.field("volume"),
            Some(&FieldValue::Integer(1_000_000))
        );
        assert_eq!(
            validated.natural_key.parts(),
            ["AAPL", "2025-06-01T00:00:00Z"]
        );
    }

    #[test]
    fn not_available_price_rejects_with_type_coercion() {
        let rejected = validate(stock_raw("N/A"), &RecordSchema::stock()).expect_err("rejected");
        assert_eq!(
            rejected
                .reasons
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            ["type-coercion:price"]
        );
    }

    #[test]
    fn every_missing_required_field_is_reported() {
        let raw = RawRecord::new(
            SourceKind::Stock,
            "https://finance.example/quote/AAPL",
            UtcDateTime::parse("2025-06-01T00:00:00Z").unwrap(),
        );
        let rejected = validate(raw, &RecordSchema::stock()).expect_err("rejected");

        let mut rendered: Vec<String> =
            rejected.reasons.iter().map(ToString::to_string).collect();
        rendered.sort();
        assert_eq!(rendered, ["missing-field:price", "missing-field:symbol"]);
    }

    #[test]
    fn failures_aggregate_across_fields() {
        let raw = RawRecord::new(
            SourceKind::Weather,
            "Pompeii",
            UtcDateTime::parse("2025-06-01T00:00:00Z").unwrap(),
        )
        .with_text("city_name", "Pompeii")
        .with_number("city_id", 42.0)
        .with_number("temperature", 812.0)
        .with_number("humidity", 150.0);

        let rejected = validate(raw, &RecordSchema::weather()).expect_err("rejected");
        let mut rendered: Vec<String> =
            rejected.reasons.iter().map(ToString::to_string).collect();
        rendered.sort();
        assert_eq!(
            rendered,
            ["out-of-range:humidity", "out-of-range:temperature"]
        );
    }

    #[test]
    fn unusable_optional_fields_are_dropped_not_fatal() {
        let raw = stock_raw("150.23")
            .with_text("change", "N/A")
            .with_text("volume", "-");

        let validated = validate(raw, &RecordSchema::stock()).expect("valid");
        assert_eq!(validated.field("price"), Some(&FieldValue::Decimal(150.23)));
        assert_eq!(validated.field("change"), None);
        assert_eq!(validated.field("volume"), None);
    }

    #[test]
    fn empty_optional_text_is_treated_as_absent() {
        let raw = RawRecord::new(
            SourceKind::Weather,
            "Oslo",
            UtcDateTime::parse("2025-06-01T00:00:00Z").unwrap(),
        )
        .with_text("city_name", "Oslo")
        .with_number("city_id", 1.0)
        .with_number("temperature", 10.0)
        .with_text("weather_description", "");

        let validated = validate(raw, &RecordSchema::weather()).expect("valid");
        assert_eq!(validated.field("weather_description"), None);
        assert_eq!(validated.field("temperature"), Some(&FieldValue::Decimal(10.0)));
    }

    #[test]
    fn negative_price_is_out_of_range() {
        let rejected = validate(stock_raw("(12.50)"), &RecordSchema::stock()).expect_err("rejected");
        assert_eq!(rejected.reasons.len(), 1);
        assert_eq!(rejected.reasons[0].to_string(), "out-of-range:price");
    }

    #[test]
    fn percent_and_sign_markers_are_stripped() {
        assert_eq!(parse_numeric("+1.85%"), Ok(1.85));
        assert_eq!(parse_numeric("(2.3)"), Ok(-2.3));
        assert_eq!(parse_numeric("65,000,000"), Ok(65_000_000.0));
        assert_eq!(parse_numeric("N/A"), Err(()));
        assert_eq!(parse_numeric(""), Err(()));
    }

    #[test]
    fn symbol_longer_than_ten_chars_is_out_of_range() {
        let raw = stock_raw("150.23");
        let raw = raw.with_text("symbol", "TOOLONGSYMBOL");
        let rejected = validate(raw, &RecordSchema::stock()).expect_err("rejected");
        assert_eq!(rejected.reasons[0].to_string(), "out-of-range:symbol");
    }
}
