// src/reshape.rs
//! Long → wide pivot with derived retail prices.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
};
use tracing::{debug, instrument};

use crate::record::{Metric, Record, Sector};

/// Unit of the derived price column.
pub const PRICE_UNIT: &str = "Cents/kWh";

/// One wide column, identified by its (sector, metric, unit) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub sector: Sector,
    pub metric: Metric,
    pub unit: String,
    /// True when no source record carries this triple and every value is computed.
    pub derived: bool,
}

impl Column {
    /// `<Sector>:<Metric>:<Unit>`
    pub fn name(&self) -> String {
        format!("{}:{}:{}", self.sector, self.metric, self.unit)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.sector, self.metric, self.unit)
    }
}

/// One (state, year, month) row; `values` line up with `WideTable::columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub state: String,
    pub year: i32,
    pub month: u32,
    pub values: Vec<Option<f64>>,
}

/// Rows sharing one column set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    columns: Vec<Column>,
    rows: Vec<WideRow>,
}

impl WideTable {
    pub fn new(columns: Vec<Column>, rows: Vec<WideRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[WideRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Value of column `name` in row `row`; `None` for a null or unknown column.
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.position(name)?;
        self.rows.get(row)?.values.get(col).copied().flatten()
    }
}

/// Multiplier from a revenue unit to dollars.
fn dollars_per(unit: &str) -> Option<f64> {
    match unit.trim().to_ascii_lowercase().as_str() {
        "dollars" => Some(1.0),
        "thousand dollars" => Some(1e3),
        "million dollars" => Some(1e6),
        _ => None,
    }
}

/// Multiplier from a sales unit to kilowatthours.
fn kwh_per(unit: &str) -> Option<f64> {
    match unit.trim().to_ascii_lowercase().as_str() {
        "kilowatthours" | "kwh" => Some(1.0),
        "megawatthours" | "mwh" => Some(1e3),
        "gigawatthours" | "gwh" => Some(1e6),
        _ => None,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Cents per kWh from revenue and sales in their source units.
/// `None` when sales are zero or either unit is not convertible.
pub fn derive_price(revenue: f64, revenue_unit: &str, sales: f64, sales_unit: &str) -> Option<f64> {
    let dollars = revenue * dollars_per(revenue_unit)?;
    let kwh = sales * kwh_per(sales_unit)?;
    if kwh == 0.0 {
        return None;
    }
    let cents = dollars / kwh * 100.0;
    cents.is_finite().then(|| round2(cents))
}

/// True for the spellings of cents per kilowatthour seen in price columns.
pub(crate) fn is_price_unit(unit: &str) -> bool {
    let unit = unit
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    matches!(unit.as_str(), "cents/kwh" | "cents / kwh" | "cents per kwh")
}

/// Columns feeding one sector's derived price, in preference order, and the
/// column it is written to.
struct PriceRule {
    revenue: Vec<usize>,
    sales: Vec<usize>,
    price: usize,
}

type Triple = (Sector, Metric, String);

#[derive(Default)]
struct SectorColumns<'t> {
    revenue: Vec<&'t Triple>,
    sales: Vec<&'t Triple>,
    price: Vec<&'t Triple>,
}

/// First non-null cell among `cols`.
fn first_present(values: &[Option<f64>], cols: &[usize]) -> Option<(usize, f64)> {
    cols.iter().find_map(|&i| values[i].map(|v| (i, v)))
}

/// Pivot `records` into one row per (state, year, month), ascending.
///
/// The column set is the union of all observed triples plus a
/// `<Sector>:Price:Cents/kWh` column for each sector reporting convertible
/// revenue and sales but no price. A source price always wins; the derived
/// value only fills rows where the source price is missing. A sector whose
/// price is reported in a unit other than cents/kWh gets no derived value.
#[instrument(level = "debug", skip_all)]
pub fn reshape<'a, I>(records: I) -> WideTable
where
    I: IntoIterator<Item = &'a Record>,
{
    let records: Vec<&Record> = records.into_iter().collect();

    let observed: BTreeSet<Triple> = records
        .iter()
        .map(|r| (r.sector.clone(), r.metric.clone(), r.unit.clone()))
        .collect();

    let mut by_sector: BTreeMap<&Sector, SectorColumns> = BTreeMap::new();
    for t in &observed {
        let slot = by_sector.entry(&t.0).or_default();
        match t.1 {
            Metric::Revenue if dollars_per(&t.2).is_some() => slot.revenue.push(t),
            Metric::Sales if kwh_per(&t.2).is_some() => slot.sales.push(t),
            Metric::Price => slot.price.push(t),
            _ => {}
        }
    }

    let mut planned: Vec<(Vec<&Triple>, Vec<&Triple>, Triple)> = Vec::new();
    for (sector, slot) in by_sector {
        if slot.revenue.is_empty() || slot.sales.is_empty() {
            continue;
        }
        let target = if slot.price.is_empty() {
            (sector.clone(), Metric::Price, PRICE_UNIT.to_string())
        } else if let Some(t) = slot.price.iter().find(|t| is_price_unit(&t.2)) {
            (**t).clone()
        } else {
            debug!(%sector, "price reported in a foreign unit, not derived");
            continue;
        };
        planned.push((slot.revenue, slot.sales, target));
    }

    let mut all = observed.clone();
    all.extend(planned.iter().map(|(_, _, p)| p.clone()));
    let columns: Vec<Column> = all
        .into_iter()
        .map(|(sector, metric, unit)| {
            let derived = !observed.contains(&(sector.clone(), metric.clone(), unit.clone()));
            Column {
                sector,
                metric,
                unit,
                derived,
            }
        })
        .collect();
    let pos: HashMap<Triple, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| ((c.sector.clone(), c.metric.clone(), c.unit.clone()), i))
        .collect();
    let rules: Vec<PriceRule> = planned
        .iter()
        .map(|(rev, sales, price)| PriceRule {
            revenue: rev.iter().map(|t| pos[*t]).collect(),
            sales: sales.iter().map(|t| pos[*t]).collect(),
            price: pos[price],
        })
        .collect();

    let mut groups: BTreeMap<(&str, i32, u32), Vec<Option<f64>>> = BTreeMap::new();
    for r in &records {
        let col = pos[&(r.sector.clone(), r.metric.clone(), r.unit.clone())];
        groups
            .entry((r.state.as_str(), r.year, r.month))
            .or_insert_with(|| vec![None; columns.len()])[col] = r.value;
    }

    let mut filled = 0usize;
    let rows: Vec<WideRow> = groups
        .into_iter()
        .map(|((state, year, month), mut values)| {
            for rule in &rules {
                if values[rule.price].is_some() {
                    continue;
                }
                let rev = first_present(&values, &rule.revenue);
                let sales = first_present(&values, &rule.sales);
                if let (Some((rc, rev)), Some((sc, sales))) = (rev, sales) {
                    values[rule.price] =
                        derive_price(rev, &columns[rc].unit, sales, &columns[sc].unit);
                    filled += values[rule.price].is_some() as usize;
                }
            }
            WideRow {
                state: state.to_string(),
                year,
                month,
                values,
            }
        })
        .collect();

    debug!(
        records = records.len(),
        rows = rows.len(),
        columns = columns.len(),
        derived_prices = filled,
        "reshape"
    );
    WideTable { columns, rows }
}
