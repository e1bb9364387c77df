//! The orchestration engine's in-memory row set.
//!
//! [`Frame`] is a plain columns-of-[`CellValue`] representation the Bronze/Silver/
//! Gold engines read and write directly. `arrow`/`parquet` are reserved for the
//! snapshot-table I/O boundary (reading a prior gold snapshot, writing the next
//! one) rather than threaded through every transform step — converting a whole
//! `RecordBatch` for a single-column standardization rule or a per-row DQM check
//! would cost more than it buys here.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use lakebatch_core::CellValue;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, name: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Keep only the rows at `keep_mask[i] == true`.
    pub fn filter_rows(&mut self, keep_mask: &[bool]) {
        let mut kept = Vec::with_capacity(self.rows.len());
        for (row, keep) in self.rows.drain(..).zip(keep_mask) {
            if *keep {
                kept.push(row);
            }
        }
        self.rows = kept;
    }

    /// Set every row's value at `column` from a parallel `String` list (the shape
    /// standardization rules and schema casting operate in).
    pub fn set_column(&mut self, column: &str, values: Vec<CellValue>) -> Result<()> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| EngineError::Other(format!("unknown column '{column}'")))?;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        Ok(())
    }

    /// Convert to an Arrow `RecordBatch` for the snapshot I/O boundary. Every
    /// column is materialized independently since a `Frame` may mix types per
    /// column but is not itself typed ahead of time.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for (idx, name) in self.columns.iter().enumerate() {
            let column: Vec<&CellValue> = self.rows.iter().map(|row| &row[idx]).collect();
            let (data_type, array) = column_to_array(&column);
            fields.push(Field::new(name, data_type, true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        RecordBatch::try_new(schema, arrays).map_err(EngineError::from)
    }

    /// Rebuild a `Frame` from an Arrow `RecordBatch` read back off a snapshot table.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let columns: Vec<String> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        let mut rows = vec![Vec::with_capacity(columns.len()); batch.num_rows()];

        for (col_idx, array) in batch.columns().iter().enumerate() {
            for row_idx in 0..batch.num_rows() {
                rows[row_idx].push(cell_from_array(array, row_idx, batch.schema().field(col_idx).data_type())?);
            }
        }
        Ok(Self { columns, rows })
    }
}

fn column_to_array(column: &[&CellValue]) -> (DataType, ArrayRef) {
    let is_all_int32 = column.iter().all(|v| matches!(v, CellValue::I32(_) | CellValue::Null));
    let is_all_int64 = column.iter().all(|v| matches!(v, CellValue::I64(_) | CellValue::Null));
    let is_all_f32 = column.iter().all(|v| matches!(v, CellValue::F32(_) | CellValue::Null));
    let is_all_f64 = column.iter().all(|v| matches!(v, CellValue::F64(_) | CellValue::Null));
    let is_all_bool = column.iter().all(|v| matches!(v, CellValue::Bool(_) | CellValue::Null));

    if is_all_int32 && !column.is_empty() {
        let values: Vec<Option<i32>> = column
            .iter()
            .map(|v| if let CellValue::I32(n) = v { Some(*n) } else { None })
            .collect();
        return (DataType::Int32, Arc::new(Int32Array::from(values)));
    }
    if is_all_int64 && !column.is_empty() {
        let values: Vec<Option<i64>> = column
            .iter()
            .map(|v| if let CellValue::I64(n) = v { Some(*n) } else { None })
            .collect();
        return (DataType::Int64, Arc::new(Int64Array::from(values)));
    }
    if is_all_f32 && !column.is_empty() {
        let values: Vec<Option<f32>> = column
            .iter()
            .map(|v| if let CellValue::F32(n) = v { Some(*n) } else { None })
            .collect();
        return (DataType::Float32, Arc::new(Float32Array::from(values)));
    }
    if is_all_f64 && !column.is_empty() {
        let values: Vec<Option<f64>> = column
            .iter()
            .map(|v| if let CellValue::F64(n) = v { Some(*n) } else { None })
            .collect();
        return (DataType::Float64, Arc::new(Float64Array::from(values)));
    }
    if is_all_bool && !column.is_empty() {
        let values: Vec<Option<bool>> = column
            .iter()
            .map(|v| if let CellValue::Bool(b) = v { Some(*b) } else { None })
            .collect();
        return (DataType::Boolean, Arc::new(BooleanArray::from(values)));
    }

    // Dates and mixed/string columns are stored as their display-string form.
    let values: Vec<Option<String>> = column
        .iter()
        .map(|v| if v.is_null() { None } else { Some(v.to_display_string()) })
        .collect();
    (DataType::Utf8, Arc::new(StringArray::from(values)))
}

fn cell_from_array(array: &ArrayRef, row_idx: usize, data_type: &DataType) -> Result<CellValue> {
    if array.is_null(row_idx) {
        return Ok(CellValue::Null);
    }
    let value = match data_type {
        DataType::Int32 => CellValue::I32(array.as_any().downcast_ref::<Int32Array>().unwrap().value(row_idx)),
        DataType::Int64 => CellValue::I64(array.as_any().downcast_ref::<Int64Array>().unwrap().value(row_idx)),
        DataType::Float32 => CellValue::F32(array.as_any().downcast_ref::<Float32Array>().unwrap().value(row_idx)),
        DataType::Float64 => CellValue::F64(array.as_any().downcast_ref::<Float64Array>().unwrap().value(row_idx)),
        DataType::Boolean => CellValue::Bool(array.as_any().downcast_ref::<BooleanArray>().unwrap().value(row_idx)),
        DataType::Utf8 => CellValue::Str(array.as_any().downcast_ref::<StringArray>().unwrap().value(row_idx).to_string()),
        other => {
            return Err(EngineError::Other(format!("unsupported arrow data type in snapshot: {other:?}")))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_record_batch() {
        let mut frame = Frame::new(vec!["id".to_string(), "name".to_string()]);
        frame.rows.push(vec![CellValue::I32(1), CellValue::Str("Alice".to_string())]);
        frame.rows.push(vec![CellValue::I32(2), CellValue::Null]);

        let batch = frame.to_record_batch().unwrap();
        let restored = Frame::from_record_batch(&batch).unwrap();

        assert_eq!(restored.columns, frame.columns);
        assert_eq!(restored.rows.len(), 2);
        assert_eq!(restored.rows[0][0], CellValue::I32(1));
        assert_eq!(restored.rows[1][1], CellValue::Null);
    }

    #[test]
    fn filter_rows_keeps_only_masked_entries() {
        let mut frame = Frame::new(vec!["id".to_string()]);
        frame.rows.push(vec![CellValue::I32(1)]);
        frame.rows.push(vec![CellValue::I32(2)]);
        frame.rows.push(vec![CellValue::I32(3)]);

        frame.filter_rows(&[true, false, true]);
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0][0], CellValue::I32(1));
        assert_eq!(frame.rows[1][0], CellValue::I32(3));
    }
}
