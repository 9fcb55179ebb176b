// src/aggregate.rs
//! Collapse wide rows over one key level, e.g. `State:sum` for one row per
//! state. Nulls are skipped by every aggregate.

use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::{debug, instrument};

use crate::error::{Result, RetailError};
use crate::format::Tabular;
use crate::index::Level;
use crate::reshape::{Column, WideRow, WideTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Mean,
    Min,
    Max,
    /// Number of non-null cells.
    Count,
    First,
    Last,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Mean => "mean",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Count => "count",
            Aggregate::First => "first",
            Aggregate::Last => "last",
        }
    }

    /// Fold the non-null cells of one column; `None` when there are none,
    /// except `Count` which is then zero.
    fn apply<I: Iterator<Item = f64>>(&self, values: I) -> Option<f64> {
        let values: Vec<f64> = values.collect();
        if values.is_empty() {
            return (*self == Aggregate::Count).then_some(0.0);
        }
        let n = values.len() as f64;
        Some(match self {
            Aggregate::Sum => values.iter().sum(),
            Aggregate::Mean => values.iter().sum::<f64>() / n,
            Aggregate::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Count => n,
            Aggregate::First => values[0],
            Aggregate::Last => values[values.len() - 1],
        })
    }
}

impl FromStr for Aggregate {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregate::Sum),
            "mean" | "avg" => Ok(Aggregate::Mean),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "count" => Ok(Aggregate::Count),
            "first" => Ok(Aggregate::First),
            "last" => Ok(Aggregate::Last),
            _ => Err(RetailError::selection("group", s, "unknown aggregate")),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `LEVEL:AGG`, the level being one of the row keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grouping {
    pub level: Level,
    pub aggregate: Aggregate,
}

impl FromStr for Grouping {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self> {
        let (level, aggregate) = s
            .split_once(':')
            .ok_or_else(|| RetailError::selection("group", s, "expected Level:aggregate"))?;
        let level = match level.parse::<Level>() {
            Ok(l @ (Level::Year | Level::Month | Level::State)) => l,
            _ => {
                return Err(RetailError::selection(
                    "group",
                    level.trim(),
                    "can only group by Year, Month or State",
                ))
            }
        };
        Ok(Grouping {
            level,
            aggregate: aggregate.parse()?,
        })
    }
}

/// Value of a grouping level; years and months order numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupKey {
    Number(i64),
    Text(String),
}

impl GroupKey {
    fn of(row: &WideRow, level: Level) -> Self {
        match level {
            Level::Year => GroupKey::Number(row.year.into()),
            Level::Month => GroupKey::Number(row.month.into()),
            _ => GroupKey::Text(row.state.clone()),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            GroupKey::Number(n) => Value::from(*n),
            GroupKey::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Number(n) => write!(f, "{}", n),
            GroupKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: GroupKey,
    pub values: Vec<Option<f64>>,
}

/// Result of `group`: one row per distinct level value, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedTable {
    level: Level,
    columns: Vec<Column>,
    rows: Vec<GroupRow>,
}

impl GroupedTable {
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn rows(&self) -> &[GroupRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, key: &GroupKey, name: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c.name() == name)?;
        let row = self.rows.iter().find(|r| r.key == *key)?;
        row.values.get(col).copied().flatten()
    }
}

impl Tabular for GroupedTable {
    fn key_names(&self) -> Vec<&str> {
        vec![self.level.as_str()]
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_keys(&self, row: usize) -> Vec<Value> {
        vec![self.rows[row].key.to_value()]
    }

    fn row_values(&self, row: usize) -> &[Option<f64>] {
        &self.rows[row].values
    }
}

/// Aggregate every value column of `table` over `grouping.level`. Derived
/// columns are aggregated like any other.
#[instrument(level = "debug", skip(table), fields(rows = table.len()))]
pub fn group(table: &WideTable, grouping: Grouping) -> GroupedTable {
    let mut buckets: BTreeMap<GroupKey, Vec<&WideRow>> = BTreeMap::new();
    for row in table.rows() {
        buckets.entry(GroupKey::of(row, grouping.level)).or_default().push(row);
    }

    let width = table.columns().len();
    let rows: Vec<GroupRow> = buckets
        .into_iter()
        .map(|(key, members)| GroupRow {
            key,
            values: (0..width)
                .map(|col| {
                    grouping.aggregate
                        .apply(members.iter().filter_map(|r| r.values[col]))
                })
                .collect(),
        })
        .collect();

    debug!(groups = rows.len(), "grouped");
    GroupedTable {
        level: grouping.level,
        columns: table.columns().to_vec(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{self, record};
    use crate::format::{format, Style};
    use crate::index::Index;
    use crate::record::{Metric, Sector};
    use crate::reshape::reshape;
    use crate::select::select;
    use anyhow::Result;

    #[test]
    fn test_parse_grouping() -> Result<()> {
        let grouping: Grouping = "state:SUM".parse()?;
        assert_eq!(grouping.level, Level::State);
        assert_eq!(grouping.aggregate, Aggregate::Sum);

        for bad in ["State", "Sector:sum", "Year:median", "Planet:sum"] {
            let err = bad.parse::<Grouping>().unwrap_err();
            assert!(
                matches!(err, RetailError::InvalidSelection { ref field, .. } if field == "group"),
                "{bad} gave {err:?}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_sum_by_state() -> Result<()> {
        let index = Index::build(fixture::two_states())?;
        let table = reshape(select(&index, [("Year", "2020")])?);
        let grouped = group(&table, "State:sum".parse()?);

        assert_eq!(grouped.len(), 2);
        let ca = GroupKey::Text("CA".into());
        let col = "Residential:Revenue:Thousand Dollars";
        let pos = table.position(col).expect("revenue column");
        let want: f64 = table
            .rows()
            .iter()
            .filter(|r| r.state == "CA")
            .filter_map(|r| r.values[pos])
            .sum();
        assert!(want > 0.0);
        assert_eq!(grouped.value(&ca, col), Some(want));
        Ok(())
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let records = vec![
            record("WA", 2022, 1, Sector::Total, Metric::Customers, Some(10.0)),
            record("WA", 2022, 2, Sector::Total, Metric::Customers, None),
            record("WA", 2022, 3, Sector::Total, Metric::Customers, Some(30.0)),
            record("WA", 2023, 1, Sector::Total, Metric::Customers, None),
        ];
        let table = reshape(&records);
        let col = "Total:Customers:Count";
        let y2022 = GroupKey::Number(2022);
        let y2023 = GroupKey::Number(2023);

        let at = |agg: Aggregate, key: &GroupKey| {
            let grouping = Grouping {
                level: Level::Year,
                aggregate: agg,
            };
            group(&table, grouping).value(key, col)
        };
        assert_eq!(at(Aggregate::Sum, &y2022), Some(40.0));
        assert_eq!(at(Aggregate::Mean, &y2022), Some(20.0));
        assert_eq!(at(Aggregate::Min, &y2022), Some(10.0));
        assert_eq!(at(Aggregate::Max, &y2022), Some(30.0));
        assert_eq!(at(Aggregate::Count, &y2022), Some(2.0));
        assert_eq!(at(Aggregate::First, &y2022), Some(10.0));
        assert_eq!(at(Aggregate::Last, &y2022), Some(30.0));
        assert_eq!(at(Aggregate::Sum, &y2023), None);
        assert_eq!(at(Aggregate::Count, &y2023), Some(0.0));
    }

    #[test]
    fn test_grouped_rendering() -> Result<()> {
        let records = vec![
            record("NV", 2023, 10, Sector::Total, Metric::Customers, Some(1.0)),
            record("NV", 2023, 9, Sector::Total, Metric::Customers, Some(2.0)),
            record("AZ", 2023, 10, Sector::Total, Metric::Customers, Some(4.0)),
        ];
        let grouped = group(&reshape(&records), "Month:sum".parse()?);
        assert_eq!(
            format(&grouped, Style::Csv)?,
            "Month,Total:Customers:Count\n9,2\n10,5\n"
        );
        Ok(())
    }
}
