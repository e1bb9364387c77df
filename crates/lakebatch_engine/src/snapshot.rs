//! Versioned snapshot I/O for "bronze landing, silver standardized, silver
//! staging, and gold tables are versioned snapshots tagged by `batch_id`".
//!
//! Each snapshot is one Parquet file per `(partition, batch_id)` under a Hive-style
//! `key=value` directory layout, written with [`parquet::arrow::ArrowWriter`] at the
//! `arrow`/`parquet` I/O boundary described on [`crate::frame`]. Reading "latest"
//! means reading every batch file and letting the caller pick `max(batch_id)`;
//! this module only reads a single named batch, which is what every caller here
//! needs.

use std::fs::File;
use std::path::{Path, PathBuf};

use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::error::{EngineError, Result};
use crate::frame::Frame;

/// Directory for one partition's batch files, built from the first row's values for
/// `partition_columns` (a batch is written as a single frame with homogeneous
/// partition values, matching how the Bronze/Silver engines produce it).
fn partition_dir(base_location: &str, frame: &Frame, partition_columns: &[String]) -> PathBuf {
    let mut dir = PathBuf::from(base_location);
    if let Some(first_row) = frame.rows.first() {
        for column in partition_columns {
            if let Some(idx) = frame.column_index(column) {
                dir.push(format!("{column}={}", first_row[idx].to_display_string()));
            }
        }
    }
    dir
}

/// Write `frame` as one batch file under its Hive-style partition directory.
/// Returns the file path written.
pub fn write_snapshot(
    base_location: &str,
    partition_columns: &[String],
    batch_id: i64,
    frame: &Frame,
) -> Result<PathBuf> {
    let dir = partition_dir(base_location, frame, partition_columns);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("batch_id={batch_id}.parquet"));

    let batch = frame.to_record_batch()?;
    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).map_err(EngineError::from)?;
    writer.write(&batch).map_err(EngineError::from)?;
    writer.close().map_err(EngineError::from)?;
    Ok(path)
}

/// Read back a single batch file written at `path`.
pub fn read_snapshot_file(path: &Path) -> Result<Frame> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(EngineError::from)?
        .build()
        .map_err(EngineError::from)?;

    let mut frame: Option<Frame> = None;
    for batch in reader {
        let batch = batch.map_err(EngineError::from)?;
        let batch_frame = Frame::from_record_batch(&batch)?;
        match &mut frame {
            Some(existing) => existing.rows.extend(batch_frame.rows),
            None => frame = Some(batch_frame),
        }
    }
    frame.ok_or_else(|| EngineError::Other(format!("empty snapshot file: {}", path.display())))
}

/// Recursively find every `batch_id={id}.parquet` file under `base_location` and
/// read+concatenate them into one frame, the shape the Silver/Gold engines read a
/// landed/standardized batch back in as.
pub fn read_snapshot_for_batch(base_location: &str, batch_id: i64) -> Result<Frame> {
    let target_name = format!("batch_id={batch_id}.parquet");
    let mut matches = Vec::new();
    collect_matching_files(Path::new(base_location), &target_name, &mut matches)?;

    let mut frame: Option<Frame> = None;
    for path in matches {
        let part = read_snapshot_file(&path)?;
        match &mut frame {
            Some(existing) => existing.rows.extend(part.rows),
            None => frame = Some(part),
        }
    }
    frame.ok_or_else(|| EngineError::Other(format!("no snapshot found for batch_id {batch_id} under {base_location}")))
}

fn collect_matching_files(dir: &Path, target_name: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_matching_files(&path, target_name, out)?;
        } else if path.file_name().and_then(|n| n.to_str()) == Some(target_name) {
            out.push(path);
        }
    }
    Ok(())
}

/// Read the snapshot tagged by the highest `batch_id` under `base_location` —
/// "latest" as described on [`crate::frame`]: every part file is a batch_id, and
/// latest means filtering to `batch_id = max(batch_id)`. Returns `None` when the
/// location has no snapshot files yet (the dataset's first batch).
pub fn read_latest_snapshot(base_location: &str) -> Result<Option<Frame>> {
    let mut all = Vec::new();
    collect_all_batch_files(Path::new(base_location), &mut all)?;

    let Some(max_batch_id) = all.iter().filter_map(|(id, _)| *id).max() else {
        return Ok(None);
    };
    let target_name = format!("batch_id={max_batch_id}.parquet");
    let matching: Vec<PathBuf> = all
        .into_iter()
        .filter(|(_, path)| path.file_name().and_then(|n| n.to_str()) == Some(target_name.as_str()))
        .map(|(_, path)| path)
        .collect();

    let mut frame: Option<Frame> = None;
    for path in matching {
        let part = read_snapshot_file(&path)?;
        match &mut frame {
            Some(existing) => existing.rows.extend(part.rows),
            None => frame = Some(part),
        }
    }
    Ok(frame)
}

fn collect_all_batch_files(dir: &Path, out: &mut Vec<(Option<i64>, PathBuf)>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_all_batch_files(&path, out)?;
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(id) = parse_batch_id(name) {
                out.push((Some(id), path));
            }
        }
    }
    Ok(())
}

fn parse_batch_id(filename: &str) -> Option<i64> {
    filename
        .strip_prefix("batch_id=")?
        .strip_suffix(".parquet")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakebatch_core::CellValue;

    #[test]
    fn round_trips_a_partitioned_batch_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("landing");

        let mut frame = Frame::new(vec!["region".to_string(), "id".to_string()]);
        frame.rows.push(vec![CellValue::Str("US".to_string()), CellValue::I32(1)]);
        frame.rows.push(vec![CellValue::Str("US".to_string()), CellValue::I32(2)]);

        let path = write_snapshot(base.to_str().unwrap(), &["region".to_string()], 42, &frame).unwrap();
        assert!(path.to_string_lossy().contains("region=US"));
        assert!(path.to_string_lossy().contains("batch_id=42"));

        let restored = read_snapshot_for_batch(base.to_str().unwrap(), 42).unwrap();
        assert_eq!(restored.row_count(), 2);
    }

    #[test]
    fn missing_batch_errors_instead_of_returning_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_snapshot_for_batch(dir.path().to_str().unwrap(), 7);
        assert!(err.is_err());
    }

    #[test]
    fn latest_snapshot_picks_the_highest_batch_id() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("gold");

        let mut first = Frame::new(vec!["id".to_string()]);
        first.rows.push(vec![CellValue::I32(1)]);
        write_snapshot(base.to_str().unwrap(), &[], 10, &first).unwrap();

        let mut second = Frame::new(vec!["id".to_string()]);
        second.rows.push(vec![CellValue::I32(2)]);
        second.rows.push(vec![CellValue::I32(3)]);
        write_snapshot(base.to_str().unwrap(), &[], 20, &second).unwrap();

        let latest = read_latest_snapshot(base.to_str().unwrap()).unwrap().unwrap();
        assert_eq!(latest.row_count(), 2);
    }

    #[test]
    fn latest_snapshot_is_none_when_location_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("gold");
        assert!(read_latest_snapshot(base.to_str().unwrap()).unwrap().is_none());
    }
}
