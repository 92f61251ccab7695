//! Field extraction rules applied to fetched response bodies.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use serde_json::Value;
use thiserror::Error;

use crate::record::RawValue;

/// A per-field extraction failure. Always permanent: the response shape,
/// not the network, is wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("rule matched nothing: {rule}")]
    NotFound { rule: String },

    #[error("invalid extraction rule '{rule}': {detail}")]
    InvalidRule { rule: String, detail: String },

    #[error("unsupported value at '{rule}': {detail}")]
    Unsupported { rule: String, detail: String },
}

/// How to pull one logical field out of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractRule {
    /// CSS selector into an HTML document; yields the first match's text.
    Css(String),
    /// Dot-separated key path into a JSON document, with `[i]` index steps
    /// (e.g. `weather[0].main`).
    JsonPath(String),
}

impl ExtractRule {
    /// Validate the rule shape without applying it. Used at config load so a
    /// typo fails startup, not the Nth cycle.
    pub fn check(&self) -> Result<(), ExtractError> {
        match self {
            Self::Css(selector) => Selector::parse(selector)
                .map(|_| ())
                .map_err(|e| ExtractError::InvalidRule {
                    rule: selector.clone(),
                    detail: e.to_string(),
                }),
            Self::JsonPath(path) => {
                if path.is_empty() {
                    return Err(ExtractError::InvalidRule {
                        rule: path.clone(),
                        detail: String::from("empty path"),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Applies a table of extraction rules to one response body.
///
/// Missing fields are reported alongside the populated ones instead of
/// failing the record; the validator turns them into rejections.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: BTreeMap<String, ExtractRule>,
}

/// Extraction output: populated fields plus per-field failures.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fields: BTreeMap<String, RawValue>,
    pub failures: Vec<(String, ExtractError)>,
}

impl FieldExtractor {
    pub fn new(rules: BTreeMap<String, ExtractRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &BTreeMap<String, ExtractRule> {
        &self.rules
    }

    /// Apply every rule against an HTML document.
    pub fn extract_html(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let mut out = Extraction::default();
        for (field, rule) in &self.rules {
            match rule {
                ExtractRule::Css(selector_text) => {
                    match Selector::parse(selector_text) {
                        Ok(selector) => match document.select(&selector).next() {
                            Some(element) => {
                                let text = element
                                    .text()
                                    .collect::<Vec<_>>()
                                    .join(" ")
                                    .trim()
                                    .to_string();
                                out.fields.insert(field.clone(), RawValue::Text(text));
                            }
                            None => out.failures.push((
                                field.clone(),
                                ExtractError::NotFound {
                                    rule: selector_text.clone(),
                                },
                            )),
                        },
                        Err(e) => out.failures.push((
                            field.clone(),
                            ExtractError::InvalidRule {
                                rule: selector_text.clone(),
                                detail: e.to_string(),
                            },
                        )),
                    }
                }
                ExtractRule::JsonPath(path) => out.failures.push((
                    field.clone(),
                    ExtractError::Unsupported {
                        rule: path.clone(),
                        detail: String::from("json path applied to HTML body"),
                    },
                )),
            }
        }
        out
    }

    /// Apply every rule against a parsed JSON document.
    pub fn extract_json(&self, document: &Value) -> Extraction {
        let mut out = Extraction::default();
        for (field, rule) in &self.rules {
            match rule {
                ExtractRule::JsonPath(path) => match lookup_path(document, path) {
                    Some(value) => match json_to_raw(value) {
                        Ok(raw) => {
                            out.fields.insert(field.clone(), raw);
                        }
                        Err(detail) => out.failures.push((
                            field.clone(),
                            ExtractError::Unsupported {
                                rule: path.clone(),
                                detail,
                            },
                        )),
                    },
                    None => out.failures.push((
                        field.clone(),
                        ExtractError::NotFound { rule: path.clone() },
                    )),
                },
                ExtractRule::Css(selector) => out.failures.push((
                    field.clone(),
                    ExtractError::Unsupported {
                        rule: selector.clone(),
                        detail: String::from("css selector applied to JSON body"),
                    },
                )),
            }
        }
        out
    }
}

/// Walk a dot-separated key path with optional `[i]` index steps.
fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for step in path.split('.') {
        let (key, indexes) = split_indexes(step)?;
        if !key.is_empty() {
            current = current.as_object()?.get(key)?;
        }
        for index in indexes {
            current = current.as_array()?.get(index)?;
        }
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Split `weather[0]` into (`weather`, [0]). Malformed brackets yield None.
fn split_indexes(step: &str) -> Option<(&str, Vec<usize>)> {
    match step.find('[') {
        None => Some((step, Vec::new())),
        Some(start) => {
            let key = &step[..start];
            let mut indexes = Vec::new();
            let mut rest = &step[start..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                indexes.push(stripped[..end].parse().ok()?);
                rest = &stripped[end + 1..];
            }
            if rest.is_empty() {
                Some((key, indexes))
            } else {
                None
            }
        }
    }
}

fn json_to_raw(value: &Value) -> Result<RawValue, String> {
    match value {
        Value::String(text) => Ok(RawValue::Text(text.clone())),
        Value::Number(number) => number
            .as_f64()
            .map(RawValue::Number)
            .ok_or_else(|| format!("non-finite number: {number}")),
        other => Err(format!("expected string or number, got {other}")),
    }
}
