// src/format/arrow.rs

use arrow::{
    array::{ArrayRef, Float64Array, Int32Array, StringArray, UInt32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::error::Result;
use crate::reshape::WideTable;

/// Arrow schema of a wide table: the three key columns, then one nullable
/// `Float64` field per `Sector:Metric:Unit` column.
pub fn wide_schema(table: &WideTable) -> Schema {
    let mut fields = vec![
        Field::new("State", DataType::Utf8, false),
        Field::new("Year", DataType::Int32, false),
        Field::new("Month", DataType::UInt32, false),
    ];
    fields.extend(
        table
            .columns()
            .iter()
            .map(|c| Field::new(c.name(), DataType::Float64, /* nullable = */ true)),
    );
    Schema::new(fields)
}

/// Columnar copy of `table` for programmatic consumers.
pub fn to_record_batch(table: &WideTable) -> Result<RecordBatch> {
    let rows = table.rows();
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(3 + table.columns().len());
    arrays.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|r| r.state.as_str()),
    )));
    arrays.push(Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))));
    arrays.push(Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.month))));
    for col in 0..table.columns().len() {
        let values: Float64Array = rows.iter().map(|r| r.values[col]).collect();
        arrays.push(Arc::new(values));
    }

    Ok(RecordBatch::try_new(Arc::new(wide_schema(table)), arrays)?)
}
