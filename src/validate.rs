// src/validate.rs
//! Consistency checks over a built index. Issues are reported, never corrected.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use tracing::{info, instrument};

use crate::index::Index;
use crate::record::{Key, Metric, Sector};
use crate::reshape::{derive_price, is_price_unit};
use crate::select::STATE_CODE;

/// Largest tolerated gap between a reported and a derived price, in cents/kWh.
pub const PRICE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub key: Option<Key>,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}: {}", key, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, key: Option<Key>, message: String) {
        self.issues.push(Issue { key, message });
    }
}

#[derive(Default)]
struct PriceInputs<'a> {
    revenue: Option<(f64, &'a str)>,
    sales: Option<(f64, &'a str)>,
    price: Option<f64>,
}

#[instrument(level = "info", skip_all, fields(records = index.len()))]
pub fn validate(index: &Index) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut units: BTreeMap<&Metric, BTreeSet<&str>> = BTreeMap::new();
    let mut months: BTreeMap<Key, BTreeSet<u32>> = BTreeMap::new();
    let mut prices: BTreeMap<(Key, u32, &Sector), PriceInputs> = BTreeMap::new();
    let mut bad_states: BTreeSet<&str> = BTreeSet::new();

    for r in index.records() {
        let key = r.key();
        if !STATE_CODE.is_match(&r.state) {
            bad_states.insert(&r.state);
        }
        if !(1..=12).contains(&r.month) {
            report.push(Some(key.clone()), format!("month {} out of range", r.month));
        }
        if let Some(v) = r.value.filter(|v| *v < 0.0) {
            report.push(
                Some(key.clone()),
                format!("month {} {}:{} is negative ({})", r.month, r.sector, r.metric, v),
            );
        }
        units.entry(&r.metric).or_default().insert(&r.unit);
        months.entry(key.clone()).or_default().insert(r.month);

        if let Some(v) = r.value {
            let slot = prices.entry((key, r.month, &r.sector)).or_default();
            match r.metric {
                Metric::Revenue => slot.revenue = Some((v, &r.unit)),
                Metric::Sales => slot.sales = Some((v, &r.unit)),
                Metric::Price if is_price_unit(&r.unit) => slot.price = Some(v),
                _ => {}
            }
        }
    }

    for state in bad_states {
        report.push(None, format!("`{}` is not a 2-letter state code", state));
    }
    for (metric, seen) in units {
        if seen.len() > 1 {
            report.push(None, format!("{} reported in several units: {:?}", metric, seen));
        }
    }
    for (key, seen) in months {
        let max = seen.iter().next_back().copied().unwrap_or(0);
        if seen.len() as u32 != max || seen.iter().next() != Some(&1) {
            report.push(Some(key), format!("months are not contiguous from 1: {:?}", seen));
        }
    }
    for ((key, month, sector), p) in prices {
        if let (Some(price), Some((rev, rev_unit)), Some((sales, sales_unit))) =
            (p.price, p.revenue, p.sales)
        {
            if let Some(derived) = derive_price(rev, rev_unit, sales, sales_unit) {
                if (price - derived).abs() > PRICE_TOLERANCE + 1e-9 {
                    report.push(
                        Some(key),
                        format!(
                            "month {} {} price {} differs from revenue/sales {}",
                            month, sector, price, derived
                        ),
                    );
                }
            }
        }
    }

    info!(issues = report.issues.len(), "validation finished");
    report
}
