//! Gold transformation graph: `direct`, `union`, `join`.
//!
//! `custom` is not a fold over a running accumulator the way these three are — it
//! registers every dependent as a named table in one SQL session and runs a single
//! query against all of them — so it lives in [`crate::custom_sql`] instead, wired
//! in by [`crate::gold::build_staging_frame`].

use crate::error::{EngineError, Result};
use crate::frame::Frame;

#[derive(Debug, Clone)]
pub enum Transformation {
    /// Passthrough of one source frame, optionally renaming columns.
    Direct { rename: Vec<(String, String)> },
    /// Concatenate rows from multiple same-shaped source frames.
    Union,
    /// Inner join two frames on paired key columns.
    Join {
        left_keys: Vec<String>,
        right_keys: Vec<String>,
    },
}

/// Apply a `direct` transformation: rename columns in place.
pub fn apply_direct(mut frame: Frame, rename: &[(String, String)]) -> Frame {
    for (from, to) in rename {
        if let Some(idx) = frame.column_index(from) {
            frame.columns[idx] = to.clone();
        }
    }
    frame
}

/// Apply a `union` transformation: every frame must share the same column list.
pub fn apply_union(frames: Vec<Frame>) -> Result<Frame> {
    let mut frames = frames.into_iter();
    let mut merged = frames
        .next()
        .ok_or_else(|| EngineError::Other("union transformation requires at least one source".to_string()))?;
    for frame in frames {
        if frame.columns != merged.columns {
            return Err(EngineError::Other(format!(
                "union column mismatch: {:?} vs {:?}",
                merged.columns, frame.columns
            )));
        }
        merged.rows.extend(frame.rows);
    }
    Ok(merged)
}

/// Apply an inner `join`: for each left row, append every matching right row's
/// non-key columns.
pub fn apply_join(left: &Frame, right: &Frame, left_keys: &[String], right_keys: &[String]) -> Result<Frame> {
    let left_idxs: Vec<usize> = left_keys
        .iter()
        .map(|k| left.column_index(k).ok_or_else(|| EngineError::Other(format!("unknown left join key '{k}'"))))
        .collect::<Result<_>>()?;
    let right_idxs: Vec<usize> = right_keys
        .iter()
        .map(|k| right.column_index(k).ok_or_else(|| EngineError::Other(format!("unknown right join key '{k}'"))))
        .collect::<Result<_>>()?;

    let right_non_key: Vec<usize> = (0..right.columns.len()).filter(|i| !right_idxs.contains(i)).collect();

    let mut columns = left.columns.clone();
    columns.extend(right_non_key.iter().map(|&i| right.columns[i].clone()));
    let mut out = Frame::new(columns);

    for left_row in &left.rows {
        let left_key: Vec<String> = left_idxs.iter().map(|&i| left_row[i].to_display_string()).collect();
        for right_row in &right.rows {
            let right_key: Vec<String> = right_idxs.iter().map(|&i| right_row[i].to_display_string()).collect();
            if left_key != right_key {
                continue;
            }
            let mut row = left_row.clone();
            row.extend(right_non_key.iter().map(|&i| right_row[i].clone()));
            out.rows.push(row);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakebatch_core::CellValue;

    fn frame(columns: &[&str], rows: Vec<Vec<CellValue>>) -> Frame {
        let mut f = Frame::new(columns.iter().map(|c| c.to_string()).collect());
        f.rows = rows;
        f
    }

    #[test]
    fn direct_renames_matching_columns_only() {
        let f = frame(&["a", "b"], vec![vec![CellValue::I32(1), CellValue::I32(2)]]);
        let renamed = apply_direct(f, &[("a".to_string(), "id".to_string())]);
        assert_eq!(renamed.columns, vec!["id".to_string(), "b".to_string()]);
    }

    #[test]
    fn union_rejects_mismatched_schemas() {
        let a = frame(&["a"], vec![]);
        let b = frame(&["b"], vec![]);
        assert!(apply_union(vec![a, b]).is_err());
    }

    #[test]
    fn union_concatenates_rows() {
        let a = frame(&["a"], vec![vec![CellValue::I32(1)]]);
        let b = frame(&["a"], vec![vec![CellValue::I32(2)]]);
        let merged = apply_union(vec![a, b]).unwrap();
        assert_eq!(merged.rows.len(), 2);
    }

    #[test]
    fn join_matches_on_key_and_appends_non_key_right_columns() {
        let left = frame(&["id", "name"], vec![vec![CellValue::I32(1), CellValue::Str("A".into())]]);
        let right = frame(
            &["id", "amount"],
            vec![vec![CellValue::I32(1), CellValue::F64(9.5)]],
        );
        let joined = apply_join(&left, &right, &["id".to_string()], &["id".to_string()]).unwrap();
        assert_eq!(joined.columns, vec!["id".to_string(), "name".to_string(), "amount".to_string()]);
        assert_eq!(joined.rows.len(), 1);
    }
}
