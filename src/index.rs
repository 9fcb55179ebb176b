// src/index.rs

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt,
    str::FromStr,
};
use tracing::{debug, info, instrument};

use crate::error::{Result, RetailError};
use crate::record::{Key, Metric, RawTable, Record, Sector};

/// A dimension of the data whose distinct values can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Year,
    Month,
    State,
    Sector,
    Metric,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Year,
        Level::Month,
        Level::State,
        Level::Sector,
        Level::Metric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Year => "Year",
            Level::Month => "Month",
            Level::State => "State",
            Level::Sector => "Sector",
            Level::Metric => "Metric",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = RetailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Level::Year),
            "month" => Ok(Level::Month),
            "state" => Ok(Level::State),
            "sector" => Ok(Level::Sector),
            // the workbook calls the metric header row "Value"
            "metric" | "value" => Ok(Level::Metric),
            _ => Err(RetailError::selection("keys", s, "unknown level")),
        }
    }
}

/// Owns the raw records and groups them by (state, year).
///
/// Built once per process; every method takes `&self`, so a built index can
/// be shared freely between readers.
#[derive(Debug)]
pub struct Index {
    records: Vec<Record>,
    by_key: HashMap<Key, Vec<usize>>,
    years_by_state: HashMap<String, BTreeSet<i32>>,
    states_by_year: HashMap<i32, BTreeSet<String>>,
}

impl Index {
    /// Group every record by (state, year). Fails on a repeated
    /// (state, year, month, sector, metric) observation.
    #[instrument(level = "info", skip(raw), fields(records = raw.len()))]
    pub fn build(raw: RawTable) -> Result<Self> {
        {
            let mut seen: HashSet<(&str, i32, u32, &Sector, &Metric)> =
                HashSet::with_capacity(raw.len());
            for r in raw.iter() {
                if !seen.insert((r.state.as_str(), r.year, r.month, &r.sector, &r.metric)) {
                    return Err(RetailError::DataIntegrity {
                        key: r.key(),
                        month: r.month,
                        sector: r.sector.to_string(),
                        metric: r.metric.to_string(),
                    });
                }
            }
        }

        let records = raw.into_records();
        let mut by_key: HashMap<Key, Vec<usize>> = HashMap::new();
        let mut years_by_state: HashMap<String, BTreeSet<i32>> = HashMap::new();
        let mut states_by_year: HashMap<i32, BTreeSet<String>> = HashMap::new();

        for (pos, r) in records.iter().enumerate() {
            by_key.entry(r.key()).or_default().push(pos);
            years_by_state
                .entry(r.state.clone())
                .or_default()
                .insert(r.year);
            states_by_year
                .entry(r.year)
                .or_default()
                .insert(r.state.clone());
        }

        info!(keys = by_key.len(), "index built");
        Ok(Self {
            records,
            by_key,
            years_by_state,
            states_by_year,
        })
    }

    /// Records matching the given fields; an omitted field matches everything.
    /// Ordered by ascending (state, year), source order within a key.
    /// An unknown state or year yields an empty vector.
    pub fn lookup(&self, state: Option<&str>, year: Option<i32>) -> Vec<&Record> {
        let keys: Vec<Key> = match (state, year) {
            (Some(state), Some(year)) => vec![Key::new(state, year)],
            (Some(state), None) => self
                .years_by_state
                .get(state)
                .map(|years| years.iter().map(|&y| Key::new(state, y)).collect())
                .unwrap_or_default(),
            (None, Some(year)) => self
                .states_by_year
                .get(&year)
                .map(|states| states.iter().map(|s| Key::new(s.as_str(), year)).collect())
                .unwrap_or_default(),
            (None, None) => self.keys().into_iter().collect(),
        };

        let out: Vec<&Record> = keys
            .iter()
            .filter_map(|k| self.by_key.get(k))
            .flatten()
            .map(|&pos| &self.records[pos])
            .collect();
        debug!(?state, ?year, matched = out.len(), "lookup");
        out
    }

    /// Every (state, year) present in the data.
    pub fn keys(&self) -> BTreeSet<Key> {
        self.by_key.keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.by_key.contains_key(key)
    }

    /// Distinct values of `level`, in that level's natural order.
    pub fn levels(&self, level: Level) -> Vec<String> {
        let rs = self.records.iter();
        match level {
            Level::Year => {
                let set: BTreeSet<i32> = rs.map(|r| r.year).collect();
                set.into_iter().map(|y| y.to_string()).collect()
            }
            Level::Month => {
                let set: BTreeSet<u32> = rs.map(|r| r.month).collect();
                set.into_iter().map(|m| m.to_string()).collect()
            }
            Level::State => {
                let set: BTreeSet<&str> = rs.map(|r| r.state.as_str()).collect();
                set.into_iter().map(str::to_string).collect()
            }
            Level::Sector => {
                let set: BTreeSet<&Sector> = rs.map(|r| &r.sector).collect();
                set.into_iter().map(Sector::to_string).collect()
            }
            Level::Metric => {
                let set: BTreeSet<&Metric> = rs.map(|r| &r.metric).collect();
                set.into_iter().map(Metric::to_string).collect()
            }
        }
    }

    /// Unit of each metric, as first reported in the source.
    pub fn units(&self) -> BTreeMap<Metric, String> {
        let mut out = BTreeMap::new();
        for r in &self.records {
            out.entry(r.metric.clone()).or_insert_with(|| r.unit.clone());
        }
        out
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
