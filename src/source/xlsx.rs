// src/source/xlsx.rs
//! The agency's `sales_revenue.xlsx` workbook.
//!
//! The first sheet has three header rows: sector (one merged cell spanning
//! its metrics), metric name, and unit. The first three columns are Year,
//! Month and State. Columns headed `Data Status` carry no figures and are
//! dropped, as is any trailing footnote row.

use calamine::{open_workbook, Data, Reader, Xlsx};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use super::parse_value;
use crate::error::{Result, RetailError};
use crate::record::{Metric, RawTable, Record, Sector};

const HEADER_ROWS: usize = 3;
const KEY_COLS: usize = 3;

#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_xlsx<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let mut workbook: Xlsx<_> = open_workbook(path.as_ref())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RetailError::InvalidSource("workbook contains no sheets".into()))??;
    decode_rows(range.rows())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        _ => String::new(),
    }
}

/// Whole number in range for `T`; anything else is not a key cell.
fn cell_int<T: TryFrom<i64>>(cell: &Data) -> Option<T> {
    let n: i64 = match cell {
        Data::Int(i) => *i,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => *f as i64,
        Data::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    T::try_from(n).ok()
}

fn cell_value(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_value(s),
        _ => None,
    }
}

/// A data column of the sheet.
struct Series {
    col: usize,
    sector: Sector,
    metric: Metric,
    unit: String,
}

/// Decode sheet rows into long-format records.
pub(crate) fn decode_rows<'a, I>(rows: I) -> Result<RawTable>
where
    I: IntoIterator<Item = &'a [Data]>,
{
    let mut rows = rows.into_iter();
    let header: Vec<&[Data]> = rows.by_ref().take(HEADER_ROWS).collect();
    if header.len() < HEADER_ROWS {
        return Err(RetailError::InvalidSource(format!(
            "expected {} header rows, found {}",
            HEADER_ROWS,
            header.len()
        )));
    }

    let width = header.iter().map(|r| r.len()).max().unwrap_or(0);
    let at = |row: &[Data], col: usize| row.get(col).map(cell_text).unwrap_or_default();

    let mut series = Vec::new();
    let mut sector = String::new();
    for col in KEY_COLS..width {
        let name = at(header[0], col);
        if !name.is_empty() {
            sector = name;
        }
        let metric = at(header[1], col);
        let unit = at(header[2], col);
        let status = [&sector, &metric, &unit]
            .iter()
            .any(|h| h.contains("Data Status"));
        if status || metric.is_empty() {
            continue;
        }
        if sector.is_empty() {
            warn!(col, %metric, "metric column without a sector heading");
            continue;
        }
        series.push(Series {
            col,
            sector: Sector::parse(&sector),
            metric: Metric::parse(&metric),
            unit,
        });
    }
    if series.is_empty() {
        return Err(RetailError::InvalidSource("no data columns in header".into()));
    }
    debug!(columns = series.len(), "workbook header decoded");

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, row) in rows.enumerate() {
        let year = row.first().and_then(cell_int::<i32>);
        let month = row.get(1).and_then(cell_int::<u32>);
        let state = row.get(2).map(cell_text).unwrap_or_default();
        let (year, month) = match (year, month) {
            (Some(y), Some(m)) if !state.is_empty() => (y, m),
            _ => {
                debug!(row = idx + HEADER_ROWS, "skipping non-data row");
                skipped += 1;
                continue;
            }
        };
        let state = state.to_ascii_uppercase();
        for s in &series {
            records.push(Record {
                state: state.clone(),
                year,
                month,
                sector: s.sector.clone(),
                metric: s.metric.clone(),
                unit: s.unit.clone(),
                value: row.get(s.col).and_then(cell_value),
            });
        }
    }

    info!(records = records.len(), skipped, "decoded workbook");
    Ok(RawTable::new(records))
}
