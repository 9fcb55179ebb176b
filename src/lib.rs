//! US retail electricity sales, revenue and price statistics by state and year.
//!
//! The raw source is a long-format table (one row per state, year, month,
//! sector and metric). It is indexed once by (state, year), then each query
//! selects a subset and pivots it into one row per (state, year, month) with
//! a `Sector:Metric:Unit` column per series, plus derived prices.
//!
//! Layers:
//! - `record`: the long-format data model
//! - `source`, `fetch`, `config`: getting the raw table
//! - `index`, `select`, `reshape`: the query pipeline
//! - `aggregate`: grouping rows over a key level
//! - `format`: text and columnar renderings
//! - `dataset`: the facade tying them together

pub mod aggregate;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod format;
pub mod index;
pub mod record;
pub mod reshape;
pub mod select;
pub mod source;
pub mod validate;

#[cfg(test)]
mod fixture;

pub use aggregate::{group, Aggregate, GroupKey, Grouping, GroupedTable};
pub use config::SourceConfig;
pub use dataset::RetailData;
pub use error::{Result, RetailError};
pub use format::{format, format_with, FormatOptions, HeaderMode, IndexMode, Style, Tabular};
pub use index::{Index, Level};
pub use record::{Key, Metric, RawTable, Record, Sector};
pub use reshape::{reshape, Column, WideRow, WideTable};
pub use select::{parse_select, select, Selection};
