use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Errors raised by one source fetch + parse.
///
/// The transient/permanent split drives what the scheduler logs and what the
/// next cycle can be expected to recover on its own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("connection failed: {detail}")]
    Connect { detail: String },

    #[error("unexpected HTTP status {code}")]
    Status { code: u16 },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("response body did not match expected structure: {detail}")]
    Parse { detail: String },
}

impl FetchError {
    /// Whether the next cycle can reasonably expect this error to clear
    /// without a config change.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::RateLimited { .. } => true,
            Self::Status { code } => *code >= 500,
            Self::Parse { .. } => false,
        }
    }
}

/// A single reason a raw record failed validation.
///
/// Reasons are collected per record, never short-circuited, so one rejected
/// record reports every problem at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    MissingField { field: String },
    TypeCoercion { field: String, value: String },
    OutOfRange { field: String, value: String },
    NotInEnum { field: String, value: String },
}

impl RejectionReason {
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field }
            | Self::TypeCoercion { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::NotInEnum { field, .. } => field,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing-field",
            Self::TypeCoercion { .. } => "type-coercion",
            Self::OutOfRange { .. } => "out-of-range",
            Self::NotInEnum { .. } => "not-in-enum",
        }
    }
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.code(), self.field())
    }
}

/// Fatal configuration problems surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path}")]
    NotFound { path: String },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{section} configuration must include '{field}'")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    #[error("invalid value for {section}.{field}: {detail}")]
    InvalidField {
        section: &'static str,
        field: &'static str,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        assert!(FetchError::Status { code: 503 }.is_transient());
        assert!(FetchError::Status { code: 500 }.is_transient());
        assert!(!FetchError::Status { code: 404 }.is_transient());
        assert!(!FetchError::Status { code: 401 }.is_transient());
    }

    #[test]
    fn timeouts_and_rate_limits_are_transient() {
        assert!(FetchError::Timeout { timeout_ms: 30_000 }.is_transient());
        assert!(FetchError::RateLimited {
            retry_after_secs: 60
        }
        .is_transient());
        assert!(!FetchError::Parse {
            detail: String::from("selector not found")
        }
        .is_transient());
    }

    #[test]
    fn rejection_reasons_render_code_and_field() {
        let reason = RejectionReason::TypeCoercion {
            field: String::from("price"),
            value: String::from("N/A"),
        };
        assert_eq!(reason.to_string(), "type-coercion:price");

        let reason = RejectionReason::MissingField {
            field: String::from("symbol"),
        };
        assert_eq!(reason.to_string(), "missing-field:symbol");
    }
}
