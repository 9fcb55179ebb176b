// src/record.rs

use std::fmt;

/// Consumption category. Known sectors order before any `Other` name,
/// and `Other` names order alphabetically among themselves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sector {
    Residential,
    Commercial,
    Industrial,
    Transportation,
    Total,
    Other(String),
}

impl Sector {
    pub const KNOWN: [Sector; 5] = [
        Sector::Residential,
        Sector::Commercial,
        Sector::Industrial,
        Sector::Transportation,
        Sector::Total,
    ];

    /// Case-insensitive; the workbook spells sectors in upper case.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        match name.to_ascii_lowercase().as_str() {
            "residential" => Sector::Residential,
            "commercial" => Sector::Commercial,
            "industrial" => Sector::Industrial,
            "transportation" => Sector::Transportation,
            "total" => Sector::Total,
            _ => Sector::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Sector::Residential => "Residential",
            Sector::Commercial => "Commercial",
            Sector::Industrial => "Industrial",
            Sector::Transportation => "Transportation",
            Sector::Total => "Total",
            Sector::Other(name) => name,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measured quantity, ordered Revenue, Sales, Customers, Price, then others.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Revenue,
    Sales,
    Customers,
    Price,
    Other(String),
}

impl Metric {
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        match name.to_ascii_lowercase().as_str() {
            "revenue" | "revenues" => Metric::Revenue,
            "sales" => Metric::Sales,
            "customers" => Metric::Customers,
            "price" => Metric::Price,
            _ => Metric::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Metric::Revenue => "Revenue",
            Metric::Sales => "Sales",
            Metric::Customers => "Customers",
            Metric::Price => "Price",
            Metric::Other(name) => name,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite (state, year) key used for indexing and selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub state: String,
    pub year: i32,
}

impl Key {
    pub fn new(state: impl Into<String>, year: i32) -> Self {
        Self {
            state: state.into(),
            year,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.state, self.year)
    }
}

/// One long-format observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub state: String,
    pub year: i32,
    pub month: u32,
    pub sector: Sector,
    pub metric: Metric,
    pub unit: String,
    /// `None` where the source has no figure.
    pub value: Option<f64>,
}

impl Record {
    pub fn key(&self) -> Key {
        Key::new(self.state.clone(), self.year)
    }
}

/// The long-format source dataset. Immutable once constructed.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    records: Vec<Record>,
}

impl RawTable {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
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

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl FromIterator<Record> for RawTable {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
