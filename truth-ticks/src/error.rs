use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All configuration errors generated in `truth-ticks`.
///
/// Data problems (malformed prints, thin windows) are never errors: they are dropped at ingestion
/// or reported as flags on the analysis result. Only configuration can fail, and only at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum ConfigError {
    #[error("step table {table} is empty")]
    EmptyStepTable { table: String },

    #[error("step table {table} thresholds must be strictly descending: {previous} then {next}")]
    UnorderedStepTable {
        table: String,
        previous: f64,
        next: f64,
    },

    #[error("step table {table} must end with a catch-all tier at 0, found {last}")]
    MissingCatchAll { table: String, last: f64 },

    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: String,
        value: f64,
        reason: &'static str,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, value: f64, reason: &'static str) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value,
            reason,
        }
    }

    /// Require `value` to be finite and strictly positive.
    pub fn ensure_positive(field: &str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Self::invalid(field, value, "must be positive"))
        }
    }

    /// Require `value` to be finite and within `[0, 1]`.
    pub fn ensure_unit(field: &str, value: f64) -> Result<(), Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Self::invalid(field, value, "must be within [0, 1]"))
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_positive() {
        struct TestCase {
            input: f64,
            expected_ok: bool,
        }

        let tests = vec![
            // TC0: positive
            TestCase {
                input: 0.06,
                expected_ok: true,
            },
            // TC1: zero
            TestCase {
                input: 0.0,
                expected_ok: false,
            },
            // TC2: negative
            TestCase {
                input: -1.0,
                expected_ok: false,
            },
            // TC3: NaN
            TestCase {
                input: f64::NAN,
                expected_ok: false,
            },
            // TC4: infinite
            TestCase {
                input: f64::INFINITY,
                expected_ok: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = ConfigError::ensure_positive("field", test.input).is_ok();
            assert_eq!(actual, test.expected_ok, "TC{} failed", index);
        }
    }

    #[test]
    fn test_ensure_unit() {
        assert!(ConfigError::ensure_unit("f", 0.0).is_ok());
        assert!(ConfigError::ensure_unit("f", 1.0).is_ok());
        assert!(ConfigError::ensure_unit("f", 1.01).is_err());
        assert!(ConfigError::ensure_unit("f", -0.01).is_err());
    }

    #[test]
    fn test_error_display_names_field() {
        let error = ConfigError::invalid("commission_buffer", -0.04, "must be positive");
        assert_eq!(
            error.to_string(),
            "invalid value for commission_buffer: -0.04 (must be positive)"
        );
    }
}
