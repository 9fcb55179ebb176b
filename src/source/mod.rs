// src/source/mod.rs
//! Decoding the raw source into a [`RawTable`].

pub mod long_csv;
pub mod xlsx;

pub use long_csv::{read_long_csv, write_long_csv};
pub use xlsx::load_xlsx;

use std::{fs::File, path::Path};
use tracing::instrument;

use crate::error::{Result, RetailError};
use crate::record::RawTable;

/// Load a local `.xlsx` workbook or long-format `.csv` file.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_path<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("xlsx") => load_xlsx(path),
        Some("csv") => read_long_csv(File::open(path)?),
        _ => Err(RetailError::InvalidSource(format!(
            "{}: expected a .xlsx or .csv file",
            path.display()
        ))),
    }
}

/// Numeric cell text. Blank cells and the agency's markers for withheld or
/// not meaningful figures (`.`, `NM`, `W`, `--`) are missing values.
pub(crate) fn parse_value(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_matches('"').replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
