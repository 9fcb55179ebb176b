// src/dataset.rs

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

use crate::aggregate::{self, Grouping, GroupedTable};
use crate::error::Result;
use crate::format::{self, FormatOptions, Style, Tabular};
use crate::index::{Index, Level};
use crate::record::{Key, Metric, RawTable};
use crate::reshape::{reshape, WideTable};
use crate::select::Selection;
use crate::validate::{self, ValidationReport};

/// Retail electricity data keyed by state and year.
///
/// ```
/// use retail::{RawTable, RetailData, Style};
///
/// let data = RetailData::new(RawTable::default())?;
/// let rows = data.get("CA", 2020)?;
/// assert!(rows.is_empty());
/// print!("{}", data.render(&rows, Style::Csv)?);
/// # Ok::<(), retail::RetailError>(())
/// ```
#[derive(Debug)]
pub struct RetailData {
    index: Index,
}

impl RetailData {
    /// Build the index once. A duplicate observation is a fatal integrity error.
    pub fn new(raw: RawTable) -> Result<Self> {
        Ok(Self {
            index: Index::build(raw)?,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Every valid (state, year) key.
    pub fn keys(&self) -> BTreeSet<Key> {
        self.index.keys()
    }

    pub fn levels(&self, level: Level) -> Vec<String> {
        self.index.levels(level)
    }

    pub fn units(&self) -> BTreeMap<Metric, String> {
        self.index.units()
    }

    /// Select then reshape. Malformed constraints are an error; a valid
    /// selection without data is an empty table.
    #[instrument(level = "info", skip_all)]
    pub fn query<I, K, V>(&self, constraints: I) -> Result<WideTable>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let sel = Selection::parse(constraints)?;
        let table = reshape(sel.apply(&self.index));
        debug!(?sel, rows = table.len(), "query");
        Ok(table)
    }

    /// Rows for one composite key; same as `query({State: state, Year: year})`.
    pub fn get(&self, state: &str, year: i32) -> Result<WideTable> {
        self.query([("State", state.to_string()), ("Year", year.to_string())])
    }

    /// Collapse a query result over one key level.
    pub fn group(&self, table: &WideTable, grouping: Grouping) -> GroupedTable {
        aggregate::group(table, grouping)
    }

    pub fn render<T: Tabular + ?Sized>(&self, table: &T, style: Style) -> Result<String> {
        format::format(table, style)
    }

    pub fn render_with<T: Tabular + ?Sized>(&self, table: &T, opts: &FormatOptions) -> Result<String> {
        format::format_with(table, opts)
    }

    pub fn validate(&self) -> ValidationReport {
        validate::validate(&self.index)
    }
}
