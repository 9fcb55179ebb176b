// src/error.rs

use thiserror::Error;

use crate::record::Key;

/// Result type alias for the data core.
pub type Result<T> = std::result::Result<T, RetailError>;

#[derive(Error, Debug)]
pub enum RetailError {
    /// The source violates the (state, year, month, sector, metric) uniqueness rule.
    /// Fatal: no index can be built from it.
    #[error("duplicate record for {key} month {month} {sector}:{metric}")]
    DataIntegrity {
        key: Key,
        month: u32,
        sector: String,
        metric: String,
    },

    /// A constraint names an unknown field or its value cannot be coerced.
    #[error("invalid selection {field}={value:?}: {reason}")]
    InvalidSelection {
        field: String,
        value: String,
        reason: String,
    },

    /// Unknown output style or header mode.
    #[error("unsupported output style `{0}`")]
    UnsupportedStyle(String),

    /// The raw source could not be interpreted as retail sales data.
    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Xlsx(#[from] calamine::XlsxError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

impl RetailError {
    pub(crate) fn selection(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RetailError::InvalidSelection {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Selection and style errors only affect the query that raised them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RetailError::InvalidSelection { .. } | RetailError::UnsupportedStyle(_)
        )
    }
}
