// src/format/mod.rs

pub mod arrow;

pub use self::arrow::to_record_batch;

use serde_json::{Map, Number, Value};
use std::{fmt, io, str::FromStr};

use crate::error::{Result, RetailError};
use crate::reshape::{Column, WideTable};

/// Leading key columns of every rendering.
pub const KEY_COLUMNS: [&str; 3] = ["State", "Year", "Month"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// Comma-separated, one header line.
    #[default]
    Csv,
    /// Space-aligned text for terminals.
    Table,
    /// Array of records.
    Json,
    /// List of records.
    Yaml,
}

impl FromStr for Style {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Style::Csv),
            "table" | "text" => Ok(Style::Table),
            "json" => Ok(Style::Json),
            "yaml" | "yml" => Ok(Style::Yaml),
            _ => Err(RetailError::UnsupportedStyle(s.to_string())),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Style::Csv => "csv",
            Style::Table => "table",
            Style::Json => "json",
            Style::Yaml => "yaml",
        })
    }
}

/// How column names are written by the delimited and table styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// One line of `Sector:Metric:Unit` names.
    #[default]
    Pack,
    /// Three lines: sector, metric, unit.
    Unpack,
    None,
}

impl FromStr for HeaderMode {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pack" => Ok(HeaderMode::Pack),
            "unpack" => Ok(HeaderMode::Unpack),
            "none" => Ok(HeaderMode::None),
            _ => Err(RetailError::UnsupportedStyle(format!("header={s}"))),
        }
    }
}

/// How the key columns are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// One column per key level.
    #[default]
    Columns,
    /// A single `State:Year:Month` column with values like `CA:2020:7`.
    Pack,
}

impl FromStr for IndexMode {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "columns" | "unpack" => Ok(IndexMode::Columns),
            "pack" => Ok(IndexMode::Pack),
            _ => Err(RetailError::UnsupportedStyle(format!("index={s}"))),
        }
    }
}

/// Largest honoured precision; `f64` carries no more significant decimals.
pub const MAX_PRECISION: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatOptions {
    pub style: Style,
    pub header: HeaderMode,
    pub index: IndexMode,
    /// Decimal places to round to; `None` keeps the source precision.
    /// Values above `MAX_PRECISION` are treated as `MAX_PRECISION`.
    pub precision: Option<u32>,
}

impl FormatOptions {
    pub fn new(style: Style) -> Self {
        Self {
            style,
            ..Default::default()
        }
    }
}

/// Anything the formatter renders: leading key columns, then one column per
/// `Sector:Metric:Unit` series.
pub trait Tabular {
    fn key_names(&self) -> Vec<&str>;
    fn columns(&self) -> &[Column];
    fn row_count(&self) -> usize;
    /// Key cells of `row`, one per key name.
    fn row_keys(&self, row: usize) -> Vec<Value>;
    fn row_values(&self, row: usize) -> &[Option<f64>];
}

impl Tabular for WideTable {
    fn key_names(&self) -> Vec<&str> {
        KEY_COLUMNS.to_vec()
    }

    fn columns(&self) -> &[Column] {
        WideTable::columns(self)
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn row_keys(&self, row: usize) -> Vec<Value> {
        let r = &self.rows()[row];
        vec![
            Value::from(r.state.as_str()),
            Value::from(r.year),
            Value::from(r.month),
        ]
    }

    fn row_values(&self, row: usize) -> &[Option<f64>] {
        &self.rows()[row].values
    }
}

/// Render `table` in `style` with default options.
pub fn format<T: Tabular + ?Sized>(table: &T, style: Style) -> Result<String> {
    format_with(table, &FormatOptions::new(style))
}

pub fn format_with<T: Tabular + ?Sized>(table: &T, opts: &FormatOptions) -> Result<String> {
    match opts.style {
        Style::Csv => to_csv(table, opts),
        Style::Table => Ok(to_text(table, opts)),
        Style::Json => Ok(serde_json::to_string_pretty(&to_records(table, opts))?),
        Style::Yaml => Ok(serde_yaml::to_string(&to_records(table, opts))?),
    }
}

fn round_to(v: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places.min(MAX_PRECISION) as i32);
    let rounded = (v * scale).round() / scale;
    if rounded.is_finite() {
        rounded
    } else {
        v
    }
}

fn apply_precision(v: f64, precision: Option<u32>) -> f64 {
    precision.map_or(v, |p| round_to(v, p))
}

/// Shortest text that reads back as the same number; never pads with zeros.
fn render_number(v: Option<f64>, precision: Option<u32>) -> String {
    v.map(|v| apply_precision(v, precision).to_string())
        .unwrap_or_default()
}

fn key_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Key column names and per-row key cells after applying the index mode.
fn keyed<T: Tabular + ?Sized>(table: &T, mode: IndexMode) -> (Vec<String>, Vec<Vec<Value>>) {
    let names: Vec<String> = table.key_names().into_iter().map(str::to_string).collect();
    let keys = (0..table.row_count()).map(|i| table.row_keys(i));
    match mode {
        IndexMode::Columns => (names, keys.collect()),
        IndexMode::Pack => (
            vec![names.join(":")],
            keys.map(|k| {
                let text: Vec<String> = k.iter().map(key_text).collect();
                vec![Value::from(text.join(":"))]
            })
            .collect(),
        ),
    }
}

fn header_lines(names: &[String], cols: &[Column], mode: HeaderMode) -> Vec<Vec<String>> {
    let keys = || names.iter().cloned();
    let blanks = || std::iter::repeat(String::new()).take(names.len());
    match mode {
        HeaderMode::Pack => vec![keys().chain(cols.iter().map(|c| c.name())).collect()],
        HeaderMode::Unpack => vec![
            blanks().chain(cols.iter().map(|c| c.sector.to_string())).collect(),
            keys().chain(cols.iter().map(|c| c.metric.to_string())).collect(),
            blanks().chain(cols.iter().map(|c| c.unit.clone())).collect(),
        ],
        HeaderMode::None => Vec::new(),
    }
}

fn body_lines<T: Tabular + ?Sized>(
    table: &T,
    keys: &[Vec<Value>],
    precision: Option<u32>,
) -> Vec<Vec<String>> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| {
            k.iter()
                .map(key_text)
                .chain(table.row_values(i).iter().map(|v| render_number(*v, precision)))
                .collect()
        })
        .collect()
}

fn to_csv<T: Tabular + ?Sized>(table: &T, opts: &FormatOptions) -> Result<String> {
    let (names, keys) = keyed(table, opts.index);
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for line in header_lines(&names, table.columns(), opts.header) {
        wtr.write_record(&line)?;
    }
    for line in body_lines(table, &keys, opts.precision) {
        wtr.write_record(&line)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| RetailError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| RetailError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn to_text<T: Tabular + ?Sized>(table: &T, opts: &FormatOptions) -> String {
    let (names, keys) = keyed(table, opts.index);
    let header = header_lines(&names, table.columns(), opts.header);
    let body = body_lines(table, &keys, opts.precision);
    let ncols = names.len() + table.columns().len();

    let mut widths = vec![0usize; ncols];
    for line in header.iter().chain(body.iter()) {
        for (w, cell) in widths.iter_mut().zip(line) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let render = |line: &[String], out: &mut String| {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell: <w$}")
                } else {
                    format!("{cell: >w$}")
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    };

    let mut out = String::new();
    for line in &header {
        render(line, &mut out);
    }
    if !header.is_empty() {
        let total = widths.iter().sum::<usize>() + 2 * ncols.saturating_sub(1);
        out.push_str(&format!("{:-<total$}\n", ""));
    }
    for line in &body {
        render(line, &mut out);
    }
    out
}

/// Record-oriented form shared by the JSON and YAML styles.
/// Missing values are explicit nulls.
pub fn to_records<T: Tabular + ?Sized>(table: &T, opts: &FormatOptions) -> Value {
    let (key_names, keys) = keyed(table, opts.index);
    let names: Vec<String> = table.columns().iter().map(|c| c.name()).collect();
    let rows = keys
        .into_iter()
        .enumerate()
        .map(|(i, k)| {
            let mut obj = Map::with_capacity(key_names.len() + names.len());
            for (name, cell) in key_names.iter().zip(k) {
                obj.insert(name.clone(), cell);
            }
            for (name, v) in names.iter().zip(table.row_values(i)) {
                let v = v
                    .and_then(|v| Number::from_f64(apply_precision(v, opts.precision)))
                    .map_or(Value::Null, Value::Number);
                obj.insert(name.clone(), v);
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{self, record};
    use crate::index::Index;
    use crate::record::{Metric, Sector};
    use crate::reshape::reshape;
    use crate::select::select;
    use anyhow::Result;
    use std::collections::BTreeSet;

    fn sample() -> WideTable {
        let records = vec![
            record("CA", 2020, 2, Sector::Residential, Metric::Revenue, Some(1234.5)),
            record("CA", 2020, 2, Sector::Residential, Metric::Sales, Some(0.0)),
            record("CA", 2020, 1, Sector::Residential, Metric::Revenue, Some(1.0)),
            record("CA", 2020, 1, Sector::Residential, Metric::Sales, Some(3.0)),
            record("CA", 2020, 1, Sector::Commercial, Metric::Customers, Some(7.0)),
        ];
        reshape(&records)
    }

    #[test]
    fn test_csv_layout() -> Result<()> {
        let text = format(&sample(), Style::Csv)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "State,Year,Month,Residential:Revenue:Thousand Dollars,Residential:Sales:Megawatthours,\
             Residential:Price:Cents/kWh,Commercial:Customers:Count"
        );
        // 1 000 $ / 3 000 kWh = 33.33 cents
        assert_eq!(lines[1], "CA,2020,1,1,3,33.33,7");
        // zero sales: empty price, absent sector: empty customers
        assert_eq!(lines[2], "CA,2020,2,1234.5,0,,");
        assert_eq!(lines.len(), 3);
        Ok(())
    }

    #[test]
    fn test_unpacked_and_missing_headers() -> Result<()> {
        let table = sample();
        let opts = FormatOptions {
            style: Style::Csv,
            header: HeaderMode::Unpack,
            ..Default::default()
        };
        let text = format_with(&table, &opts)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ",,,Residential,Residential,Residential,Commercial");
        assert_eq!(lines[1], "State,Year,Month,Revenue,Sales,Price,Customers");
        assert_eq!(lines[2], ",,,Thousand Dollars,Megawatthours,Cents/kWh,Count");
        assert_eq!(lines.len(), 5);

        let opts = FormatOptions {
            header: HeaderMode::None,
            ..opts
        };
        let text = format_with(&table, &opts)?;
        assert!(text.starts_with("CA,2020,1,"));
        Ok(())
    }

    #[test]
    fn test_precision_rounds_without_padding() -> Result<()> {
        let opts = FormatOptions {
            style: Style::Csv,
            header: HeaderMode::None,
            precision: Some(0),
            ..Default::default()
        };
        let text = format_with(&sample(), &opts)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CA,2020,1,1,3,33,7");
        assert_eq!(lines[1], "CA,2020,2,1235,0,,");
        Ok(())
    }

    #[test]
    fn test_oversized_precision_is_clamped() -> Result<()> {
        let table = reshape(&[record("CA", 2020, 1, Sector::Total, Metric::Customers, Some(1.25))]);
        for precision in [15, 400, u32::MAX] {
            let opts = FormatOptions {
                header: HeaderMode::None,
                precision: Some(precision),
                ..Default::default()
            };
            assert_eq!(format_with(&table, &opts)?, "CA,2020,1,1.25\n");
            let json = format_with(&table, &FormatOptions { style: Style::Json, ..opts })?;
            let parsed: Value = serde_json::from_str(&json)?;
            assert_eq!(parsed[0]["Total:Customers:Count"], 1.25);
        }
        Ok(())
    }

    #[test]
    fn test_packed_index() -> Result<()> {
        let opts = FormatOptions {
            index: IndexMode::Pack,
            ..Default::default()
        };
        let text = format_with(&sample(), &opts)?;
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("State:Year:Month,Residential:Revenue:"));
        assert_eq!(lines[1], "CA:2020:1,1,3,33.33,7");

        let json = format_with(&sample(), &FormatOptions { style: Style::Json, ..opts })?;
        let parsed: Value = serde_json::from_str(&json)?;
        assert_eq!(parsed[1]["State:Year:Month"], "CA:2020:2");
        assert!("sideways".parse::<IndexMode>().is_err());
        Ok(())
    }

    #[test]
    fn test_json_uses_explicit_nulls() -> Result<()> {
        let text = format(&sample(), Style::Json)?;
        let parsed: Value = serde_json::from_str(&text)?;
        let rows = parsed.as_array().expect("array of records");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["State"], "CA");
        assert_eq!(rows[0]["Month"], 1);
        assert_eq!(rows[0]["Residential:Price:Cents/kWh"], 33.33);
        assert!(rows[1]["Residential:Price:Cents/kWh"].is_null());
        assert!(rows[1]["Commercial:Customers:Count"].is_null());

        // key columns lead, in order
        let first_keys: Vec<&String> = rows[0].as_object().unwrap().keys().take(3).collect();
        assert_eq!(first_keys, vec!["State", "Year", "Month"]);
        Ok(())
    }

    #[test]
    fn test_yaml_records() -> Result<()> {
        let text = format(&sample(), Style::Yaml)?;
        let parsed: Value = serde_yaml::from_str(&text)?;
        assert_eq!(parsed, to_records(&sample(), &FormatOptions::new(Style::Yaml)));
        assert_eq!(parsed[0]["State"], "CA");
        assert!(parsed[1]["Residential:Price:Cents/kWh"].is_null());
        Ok(())
    }

    #[test]
    fn test_table_is_aligned() -> Result<()> {
        let text = format(&sample(), Style::Table)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("State  Year  Month"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(lines[2].find("2020"), lines[3].find("2020"));
        Ok(())
    }

    #[test]
    fn test_unknown_style_and_header() {
        let err = "xml".parse::<Style>().unwrap_err();
        assert!(matches!(err, RetailError::UnsupportedStyle(ref s) if s == "xml"));
        assert!(err.is_recoverable());
        assert!("sideways".parse::<HeaderMode>().is_err());
        assert_eq!("JSON".parse::<Style>().ok(), Some(Style::Json));
    }

    #[test]
    fn test_empty_table_renders_header_only() -> Result<()> {
        let table = WideTable::default();
        assert_eq!(format(&table, Style::Csv)?, "State,Year,Month\n");
        assert_eq!(format(&table, Style::Json)?, "[]");
        Ok(())
    }

    #[test]
    fn test_csv_round_trip() -> Result<()> {
        let index = Index::build(fixture::two_states())?;
        let table = reshape(select(&index, [("Year", "2020")])?);
        let text = format(&table, Style::Csv)?;

        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let headers = rdr.headers()?.clone();
        let names: Vec<String> = table.columns().iter().map(|c| c.name()).collect();
        assert_eq!(headers.iter().skip(3).collect::<Vec<_>>(), names);

        let mut keys = BTreeSet::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec?;
            keys.insert((rec[0].to_string(), rec[1].parse::<i32>()?, rec[2].parse::<u32>()?));
            for (j, col) in table.columns().iter().enumerate() {
                if col.derived {
                    continue;
                }
                let cell = &rec[3 + j];
                let want = table.rows()[i].values[j];
                let got = if cell.is_empty() { None } else { Some(cell.parse::<f64>()?) };
                match (got, want) {
                    (Some(g), Some(w)) => assert!((g - w).abs() < 1e-9),
                    (g, w) => assert_eq!(g, w),
                }
            }
        }
        let want: BTreeSet<(String, i32, u32)> = table
            .rows()
            .iter()
            .map(|r| (r.state.clone(), r.year, r.month))
            .collect();
        assert_eq!(keys, want);
        Ok(())
    }
}
