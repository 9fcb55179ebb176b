// src/fixture.rs
//! Synthetic raw tables shared by the unit tests.

use crate::record::{Metric, RawTable, Record, Sector};

pub fn unit_for(metric: &Metric) -> &'static str {
    match metric {
        Metric::Revenue => "Thousand Dollars",
        Metric::Sales => "Megawatthours",
        Metric::Customers => "Count",
        Metric::Price => "Cents/kWh",
        Metric::Other(_) => "",
    }
}

pub fn record(
    state: &str,
    year: i32,
    month: u32,
    sector: Sector,
    metric: Metric,
    value: Option<f64>,
) -> Record {
    let unit = unit_for(&metric).to_string();
    Record {
        state: state.to_string(),
        year,
        month,
        sector,
        metric,
        unit,
        value,
    }
}

pub fn revenue(month: u32, sector_idx: usize) -> f64 {
    100.0 * (sector_idx as f64 + 1.0) + month as f64
}

pub fn sales(month: u32, sector_idx: usize) -> f64 {
    1000.0 * (sector_idx as f64 + 1.0) + 10.0 * month as f64
}

pub fn price(month: u32, sector_idx: usize) -> f64 {
    (revenue(month, sector_idx) / sales(month, sector_idx) * 100.0 * 100.0).round() / 100.0
}

/// Revenue, sales and customers for every month and known sector; with
/// `with_price` the source price column is included as well.
pub fn year_records(state: &str, year: i32, with_price: bool) -> Vec<Record> {
    let mut out = Vec::new();
    for month in 1..=12 {
        for (si, sector) in Sector::KNOWN.iter().enumerate() {
            out.push(record(state, year, month, sector.clone(), Metric::Revenue, Some(revenue(month, si))));
            out.push(record(state, year, month, sector.clone(), Metric::Sales, Some(sales(month, si))));
            out.push(record(
                state,
                year,
                month,
                sector.clone(),
                Metric::Customers,
                Some(50.0 * (si as f64 + 1.0)),
            ));
            if with_price {
                out.push(record(state, year, month, sector.clone(), Metric::Price, Some(price(month, si))));
            }
        }
    }
    out
}

/// CA/2020 with all 12 × 5 × 4 observations.
pub fn ca_2020() -> RawTable {
    RawTable::new(year_records("CA", 2020, true))
}

/// CA and NY for 2019 and 2020, without source prices.
pub fn two_states() -> RawTable {
    let mut records = Vec::new();
    for state in ["NY", "CA"] {
        for year in [2020, 2019] {
            records.extend(year_records(state, year, false));
        }
    }
    RawTable::new(records)
}

pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,retail=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
