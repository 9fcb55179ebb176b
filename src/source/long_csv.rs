// src/source/long_csv.rs

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, info};

use super::parse_value;
use crate::error::{Result, RetailError};
use crate::record::{Metric, RawTable, Record, Sector};

/// One line of the long-format file.
#[derive(Debug, Serialize, Deserialize)]
struct LongRow {
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "Sector")]
    sector: String,
    #[serde(rename = "Metric")]
    metric: String,
    #[serde(rename = "Unit")]
    unit: String,
    #[serde(rename = "Value")]
    value: String,
}

/// Read `State,Year,Month,Sector,Metric,Unit,Value` rows. An empty or
/// non-numeric Value is a missing figure.
pub fn read_long_csv<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (idx, row) in rdr.deserialize::<LongRow>().enumerate() {
        let row = row?;
        if row.state.is_empty() {
            return Err(RetailError::InvalidSource(format!(
                "line {}: empty State",
                idx + 2
            )));
        }
        let value = parse_value(&row.value);
        if value.is_none() && !row.value.is_empty() {
            debug!(line = idx + 2, raw = %row.value, "non-numeric value treated as missing");
        }
        records.push(Record {
            state: row.state.to_ascii_uppercase(),
            year: row.year,
            month: row.month,
            sector: Sector::parse(&row.sector),
            metric: Metric::parse(&row.metric),
            unit: row.unit,
            value,
        });
    }

    info!(records = records.len(), "read long-format csv");
    Ok(RawTable::new(records))
}

/// Write `table` in the layout [`read_long_csv`] accepts.
pub fn write_long_csv<W: Write>(table: &RawTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in table.iter() {
        wtr.serialize(LongRow {
            state: r.state.clone(),
            year: r.year,
            month: r.month,
            sector: r.sector.to_string(),
            metric: r.metric.to_string(),
            unit: r.unit.clone(),
            value: r.value.map(|v| v.to_string()).unwrap_or_default(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use anyhow::Result;
    use std::io::Cursor;

    #[test]
    fn test_read_long_csv() -> Result<()> {
        let content = "State,Year,Month,Sector,Metric,Unit,Value
ca,2020,1,RESIDENTIAL,Revenue,Thousand Dollars,1234.5
CA,2020,1,RESIDENTIAL,Sales,Megawatthours,
CA,2020,1,Agriculture,Customers,Count,NM
";
        let table = read_long_csv(Cursor::new(content))?;
        assert_eq!(table.len(), 3);

        let first = &table.records()[0];
        assert_eq!(first.state, "CA");
        assert_eq!(first.sector, Sector::Residential);
        assert_eq!(first.metric, Metric::Revenue);
        assert_eq!(first.value, Some(1234.5));
        assert_eq!(table.records()[1].value, None);
        assert_eq!(table.records()[2].sector, Sector::Other("Agriculture".into()));
        assert_eq!(table.records()[2].value, None);
        Ok(())
    }

    #[test]
    fn test_bad_year_is_csv_error() {
        let content = "State,Year,Month,Sector,Metric,Unit,Value\nCA,twenty,1,Total,Sales,Megawatthours,1\n";
        let err = read_long_csv(Cursor::new(content)).unwrap_err();
        assert!(matches!(err, RetailError::Csv(_)));
    }

    #[test]
    fn test_write_then_read_preserves_records() -> Result<()> {
        let table = fixture::ca_2020();
        let mut buf = Vec::new();
        write_long_csv(&table, &mut buf)?;

        let back = read_long_csv(Cursor::new(buf))?;
        assert_eq!(back.records(), table.records());
        Ok(())
    }
}
