//! `custom` gold transformation: an in-memory DuckDB session the configured query
//! runs against.
//!
//! Each dependent's staging *latest* frame is loaded into a same-named DuckDB
//! table via the Arrow appender, the last dependency row's
//! `custom_transformation_query` runs against that session, and the result set is
//! read back through Arrow into a [`Frame`].

use arrow::datatypes::DataType;
use duckdb::Connection;

use crate::error::{EngineError, Result};
use crate::frame::Frame;

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn duckdb_column_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float32 => "REAL",
        DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        _ => "VARCHAR",
    }
}

fn load_table(conn: &Connection, name: &str, frame: &Frame) -> Result<()> {
    let batch = frame.to_record_batch()?;
    let schema = batch.schema();

    let columns_sql: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| format!("{} {}", quote_ident(f.name()), duckdb_column_type(f.data_type())))
        .collect();
    conn.execute(&format!("CREATE TABLE {} ({})", quote_ident(name), columns_sql.join(", ")), [])
        .map_err(EngineError::from)?;

    let mut appender = conn.appender(name).map_err(EngineError::from)?;
    appender.append_record_batch(batch).map_err(EngineError::from)?;
    appender.flush().map_err(EngineError::from)?;
    Ok(())
}

/// Register every `(table_name, frame)` pair in `tables` as a DuckDB table, run
/// `query` against them, and return the result set as a `Frame`.
pub fn execute_custom(tables: &[(String, Frame)], query: &str) -> Result<Frame> {
    let conn = Connection::open_in_memory().map_err(EngineError::from)?;
    for (name, frame) in tables {
        load_table(&conn, name, frame)?;
    }

    let mut stmt = conn.prepare(query).map_err(EngineError::from)?;
    let arrow_result = stmt.query_arrow([]).map_err(EngineError::from)?;

    let mut merged: Option<Frame> = None;
    for batch in arrow_result {
        let part = Frame::from_record_batch(&batch)?;
        merged = Some(match merged {
            Some(mut acc) => {
                acc.rows.extend(part.rows);
                acc
            }
            None => part,
        });
    }
    merged.ok_or_else(|| EngineError::Other("custom transformation query returned no result set".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakebatch_core::CellValue;

    #[test]
    fn registers_tables_and_executes_query() {
        let mut a = Frame::new(vec!["id".to_string(), "amount".to_string()]);
        a.rows.push(vec![CellValue::I32(1), CellValue::F64(10.0)]);
        a.rows.push(vec![CellValue::I32(2), CellValue::F64(20.0)]);

        let result = execute_custom(
            &[("orders".to_string(), a)],
            "SELECT id, amount * 2 AS doubled FROM orders ORDER BY id",
        )
        .unwrap();

        assert_eq!(result.columns, vec!["id".to_string(), "doubled".to_string()]);
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn joins_across_two_registered_tables() {
        let mut left = Frame::new(vec!["id".to_string(), "name".to_string()]);
        left.rows.push(vec![CellValue::I32(1), CellValue::Str("A".to_string())]);

        let mut right = Frame::new(vec!["id".to_string(), "score".to_string()]);
        right.rows.push(vec![CellValue::I32(1), CellValue::I32(9)]);

        let result = execute_custom(
            &[("people".to_string(), left), ("scores".to_string(), right)],
            "SELECT people.name, scores.score FROM people JOIN scores ON people.id = scores.id",
        )
        .unwrap();

        assert_eq!(result.rows.len(), 1);
    }
}
