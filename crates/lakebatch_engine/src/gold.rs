//! Gold Engine: transformation graph, SCD-2 envelope, two-phase merge.
//!
//! Transformations (`direct`, `union`, `join`, `custom`) produce a staging frame of
//! business columns; this module then synthesizes the SCD-2 envelope and performs
//! the two-phase merge against the existing gold frame.

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};

use lakebatch_catalog::{CatalogStore, DatasetMaster, RunStatus, TransformationDependencyMaster};
use lakebatch_core::CellValue;

use crate::custom_sql;
use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::snapshot;
use crate::transform;

pub const EFF_END_DT_SENTINEL: &str = "9999-12-31";
const SILVER_LAYER: &str = "SILVER";

/// Deterministic hash of the declared business columns, concatenated in declared
/// order, used as `sys_checksum`.
pub fn compute_checksum(row: &[CellValue], declared_columns: &[usize]) -> String {
    let mut hasher = Sha256::new();
    for &idx in declared_columns {
        hasher.update(row[idx].to_display_string().as_bytes());
        hasher.update(b"\x1f");
    }
    format!("{:x}", hasher.finalize())
}

/// Append `data_date`, `batch_id`, `eff_strt_dt`, `eff_end_dt`, `sys_del_flg`,
/// `sys_created_ts`, `sys_modified_ts`, `sys_checksum` to every row of `staging`,
/// returning a new frame with the envelope columns appended.
pub fn synthesize_scd2_envelope(staging: &Frame, batch_id: i64, today: NaiveDate, now_ts: &str) -> Frame {
    let declared_columns: Vec<usize> = (0..staging.columns.len()).collect();

    let mut columns = staging.columns.clone();
    columns.extend([
        "data_date".to_string(),
        "batch_id".to_string(),
        "eff_strt_dt".to_string(),
        "eff_end_dt".to_string(),
        "sys_del_flg".to_string(),
        "sys_created_ts".to_string(),
        "sys_modified_ts".to_string(),
        "sys_checksum".to_string(),
    ]);

    let mut out = Frame::new(columns);
    for row in &staging.rows {
        let checksum = compute_checksum(row, &declared_columns);
        let mut new_row = row.clone();
        new_row.extend([
            CellValue::Date(today),
            CellValue::I64(batch_id),
            CellValue::Date(today),
            CellValue::Str(EFF_END_DT_SENTINEL.to_string()),
            CellValue::Str("N".to_string()),
            CellValue::Str(now_ts.to_string()),
            CellValue::Str(now_ts.to_string()),
            CellValue::Str(checksum),
        ]);
        out.rows.push(new_row);
    }
    out
}

fn row_key(row: &[CellValue], key_indices: &[usize]) -> Vec<String> {
    key_indices.iter().map(|&i| row[i].to_display_string()).collect()
}

/// Two-phase SCD-2 merge of `staging` (already envelope-synthesized) against the
/// current `gold` frame, matching on `primary_key_columns`.
///
/// Phase 1 closes any currently-active gold row whose checksum differs from the
/// incoming staging row for the same key. Phase 2 inserts every staging row that
/// has no currently-active match left after phase 1 — this covers both genuinely
/// new keys and keys whose prior active version was just closed.
pub fn merge_scd2(gold: &mut Frame, staging: &Frame, primary_key_columns: &[&str]) -> Result<()> {
    let key_indices: Vec<usize> = primary_key_columns
        .iter()
        .map(|name| {
            gold.column_index(name)
                .ok_or_else(|| EngineError::Other(format!("unknown primary key column '{name}'")))
        })
        .collect::<Result<_>>()?;

    let eff_end_idx = gold
        .column_index("eff_end_dt")
        .ok_or_else(|| EngineError::Other("gold frame missing eff_end_dt".to_string()))?;
    let checksum_idx = gold
        .column_index("sys_checksum")
        .ok_or_else(|| EngineError::Other("gold frame missing sys_checksum".to_string()))?;
    let del_flg_idx = gold
        .column_index("sys_del_flg")
        .ok_or_else(|| EngineError::Other("gold frame missing sys_del_flg".to_string()))?;
    let modified_idx = gold
        .column_index("sys_modified_ts")
        .ok_or_else(|| EngineError::Other("gold frame missing sys_modified_ts".to_string()))?;

    let staging_checksum_idx = staging
        .column_index("sys_checksum")
        .ok_or_else(|| EngineError::Other("staging frame missing sys_checksum".to_string()))?;
    let staging_strt_idx = staging
        .column_index("eff_strt_dt")
        .ok_or_else(|| EngineError::Other("staging frame missing eff_strt_dt".to_string()))?;

    // Phase 1: close active gold rows whose checksum diverges from the incoming row.
    let mut matched_keys = std::collections::HashSet::new();
    for staging_row in &staging.rows {
        let key = row_key(staging_row, &key_indices);
        for gold_row in gold.rows.iter_mut() {
            if gold_row[eff_end_idx].to_display_string() != EFF_END_DT_SENTINEL {
                continue;
            }
            if row_key(gold_row, &key_indices) != key {
                continue;
            }
            matched_keys.insert(key.clone());
            if gold_row[checksum_idx].to_display_string() == staging_row[staging_checksum_idx].to_display_string() {
                continue;
            }
            gold_row[eff_end_idx] = staging_row[staging_strt_idx].clone();
            gold_row[del_flg_idx] = CellValue::Str("Y".to_string());
            gold_row[modified_idx] = staging_row[staging_strt_idx].clone();
        }
    }

    // Phase 2: insert every staging row with no surviving active match (new key, or
    // a key whose previous active version was just closed above).
    for staging_row in &staging.rows {
        let key = row_key(staging_row, &key_indices);
        let still_active = gold.rows.iter().any(|gold_row| {
            row_key(gold_row, &key_indices) == key && gold_row[eff_end_idx].to_display_string() == EFF_END_DT_SENTINEL
        });
        if !still_active {
            gold.rows.push(staging_row.clone());
        }
    }

    Ok(())
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

/// Pair up `left_table_columns`/`right_table_columns` CSV lists into rename pairs
/// for a `direct` step — the source column each position names, renamed to the
/// matching target column.
fn parse_rename_pairs(left: Option<&str>, right: Option<&str>) -> Vec<(String, String)> {
    let left = left.map(split_csv).unwrap_or_default();
    let right = right.map(split_csv).unwrap_or_default();
    left.into_iter().zip(right).collect()
}

/// Parse `extra_values`'s comma-separated `col=literal` pairs (e.g.
/// `"country='IN'"`). The literal's surrounding quotes, single or double, are
/// stripped; an unquoted literal is kept as-is.
fn parse_extra_values(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(col, literal)| {
            let literal = literal.trim();
            let stripped = literal
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| literal.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
                .unwrap_or(literal);
            (col.trim().to_string(), stripped.to_string())
        })
        .collect()
}

/// Append each `(column, literal)` pair to `frame` as a column holding that same
/// literal string value on every row.
fn add_literal_columns(frame: &mut Frame, literals: &[(String, String)]) {
    for (column, literal) in literals {
        frame.columns.push(column.clone());
        for row in frame.rows.iter_mut() {
            row.push(CellValue::Str(literal.clone()));
        }
    }
}

/// Select and reorder `frame`'s columns to exactly `declared`, in declared order.
/// Errors if `frame` is missing any declared column — this is also what drops a
/// dependent's source `batch_id` column, since `batch_id` is never itself a
/// declared business column.
fn select_declared_columns(frame: Frame, declared: &[String]) -> Result<Frame> {
    let indices: Vec<usize> = declared
        .iter()
        .map(|name| {
            frame
                .column_index(name)
                .ok_or_else(|| EngineError::Other(format!("declared column '{name}' missing from transformed frame")))
        })
        .collect::<Result<_>>()?;

    let mut out = Frame::new(declared.to_vec());
    for row in &frame.rows {
        out.rows.push(indices.iter().map(|&i| row[i].clone()).collect());
    }
    Ok(out)
}

/// Build this dataset's staging frame by folding its ordered
/// `transformation_dependency_master` steps over the named dependent datasets'
/// silver *staging* snapshots (`staging_location`, not `location` — the
/// post-quality-gate table, never the pre-gate standardized one). Every step in
/// the list shares one `transformation_type`.
///
/// `direct` reads its single dependent's staging snapshot for exactly this
/// `batch_id` and renames columns. `union` reads each dependent's staging
/// *latest*, adds any `extra_values` literal columns, and concatenates. `join`
/// reads each dependent's staging *latest* and inner-joins it against the
/// running accumulator. All three then select the dataset's declared business
/// columns (via `column_metadata`), in declared order. `custom` is delegated to
/// [`build_custom_staging_frame`] since it registers every dependent as a named
/// table and runs one query rather than folding an accumulator.
async fn build_staging_frame(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    steps: &[TransformationDependencyMaster],
    batch_id: i64,
) -> Result<Frame> {
    let first = steps.first().ok_or_else(|| {
        EngineError::Other(format!("dataset {} has no transformation_dependency_master rows", dataset.dataset_id))
    })?;

    if first.transformation_type == "custom" {
        return build_custom_staging_frame(store, process_id, dataset, steps).await;
    }

    let mut accumulated: Option<Frame> = None;

    for step in steps {
        let dependent = store.dataset(process_id, step.dependent_dataset_id, SILVER_LAYER).await?;
        let dependent_staging = dependent.staging_location.as_deref().ok_or_else(|| {
            EngineError::Other(format!("silver dataset {} has no staging_location", dependent.dataset_id))
        })?;

        accumulated = Some(match step.transformation_type.as_str() {
            "direct" => {
                let dependent_frame = snapshot::read_snapshot_for_batch(dependent_staging, batch_id)?;
                let rename = parse_rename_pairs(step.left_table_columns.as_deref(), step.right_table_columns.as_deref());
                transform::apply_direct(dependent_frame, &rename)
            }
            "union" => {
                let mut dependent_frame = latest_staging_frame(dependent_staging, step.dependent_dataset_id)?;
                if let Some(extra) = step.extra_values.as_deref() {
                    add_literal_columns(&mut dependent_frame, &parse_extra_values(extra));
                }
                match accumulated {
                    Some(existing) => transform::apply_union(vec![existing, dependent_frame])?,
                    None => dependent_frame,
                }
            }
            "join" => {
                let dependent_frame = latest_staging_frame(dependent_staging, step.dependent_dataset_id)?;
                let left = accumulated.ok_or_else(|| {
                    EngineError::Other(format!(
                        "dataset {} transformation_step {} is a join with no left-hand accumulator",
                        dataset.dataset_id, step.transformation_step
                    ))
                })?;
                let left_keys = split_csv(step.left_table_columns.as_deref().unwrap_or_default());
                let right_keys = split_csv(step.right_table_columns.as_deref().unwrap_or_default());
                transform::apply_join(&left, &dependent_frame, &left_keys, &right_keys)?
            }
            other => return Err(EngineError::UnknownTransformation(other.to_string())),
        });
    }

    let frame = accumulated.ok_or_else(|| {
        EngineError::Other(format!("dataset {} has no transformation_dependency_master rows", dataset.dataset_id))
    })?;

    let declared = store.column_metadata(dataset.dataset_id).await?;
    let declared_names: Vec<String> = declared.into_iter().map(|c| c.column_name).collect();
    select_declared_columns(frame, &declared_names)
}

fn latest_staging_frame(location: &str, dependent_dataset_id: i64) -> Result<Frame> {
    snapshot::read_latest_snapshot(location)?
        .ok_or_else(|| EngineError::Other(format!("dependent dataset {dependent_dataset_id} has no staging snapshot yet")))
}

/// Register every step's dependent staging-*latest* frame under its own
/// `staging_table` name, then execute the final step's `custom_transformation_query`
/// against all of them.
async fn build_custom_staging_frame(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    steps: &[TransformationDependencyMaster],
) -> Result<Frame> {
    let mut tables = Vec::with_capacity(steps.len());
    for step in steps {
        let dependent = store.dataset(process_id, step.dependent_dataset_id, SILVER_LAYER).await?;
        let dependent_staging = dependent.staging_location.as_deref().ok_or_else(|| {
            EngineError::Other(format!("silver dataset {} has no staging_location", dependent.dataset_id))
        })?;
        let frame = latest_staging_frame(dependent_staging, step.dependent_dataset_id)?;
        let table_name = step.staging_table.clone().ok_or_else(|| {
            EngineError::Other(format!(
                "dataset {} transformation_step {} is a custom transformation with no staging_table name",
                dataset.dataset_id, step.transformation_step
            ))
        })?;
        tables.push((table_name, frame));
    }

    let last = steps.last().expect("checked non-empty by build_staging_frame");
    let query = last.custom_transformation_query.as_deref().ok_or_else(|| {
        EngineError::Other(format!(
            "dataset {} transformation_step {} is a custom transformation with no custom_transformation_query",
            dataset.dataset_id, last.transformation_step
        ))
    })?;

    custom_sql::execute_custom(&tables, query)
}

/// Run one gold dataset's transformation for `batch_id`: fold its dependency graph
/// into a staging frame, synthesize the SCD-2 envelope, merge against the current
/// gold snapshot (if any), and write the merged result back under a new batch file.
pub async fn run_gold_for_batch(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    batch_id: i64,
    today: NaiveDate,
    now_ts: &str,
) -> Result<()> {
    let start = Utc::now().naive_utc();
    let steps = store.transformation_dependencies(process_id, dataset.dataset_id).await?;

    let outcome = run_gold_for_batch_inner(store, process_id, dataset, &steps, batch_id, today, now_ts).await;

    match &outcome {
        Ok(()) => {
            store
                .insert_log_transformation(batch_id, today, process_id, dataset.dataset_id, RunStatus::Succeeded, None, start)
                .await?;
        }
        Err(err) => {
            store
                .insert_log_transformation(
                    batch_id,
                    today,
                    process_id,
                    dataset.dataset_id,
                    RunStatus::Failed,
                    Some(err.to_string().as_str()),
                    start,
                )
                .await?;
        }
    }
    outcome
}

async fn run_gold_for_batch_inner(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    steps: &[TransformationDependencyMaster],
    batch_id: i64,
    today: NaiveDate,
    now_ts: &str,
) -> Result<()> {
    let staging = build_staging_frame(store, process_id, dataset, steps, batch_id).await?;
    let envelope = synthesize_scd2_envelope(&staging, batch_id, today, now_ts);

    let primary_keys: Vec<String> = steps
        .last()
        .and_then(|step| step.primary_keys.as_deref())
        .map(split_csv)
        .unwrap_or_default();
    let primary_key_refs: Vec<&str> = primary_keys.iter().map(String::as_str).collect();

    let merged = match snapshot::read_latest_snapshot(&dataset.location)? {
        Some(mut existing) => {
            merge_scd2(&mut existing, &envelope, &primary_key_refs)?;
            existing
        }
        None => envelope,
    };

    let partition_columns = dataset.partition_column_list();
    snapshot::write_snapshot(&dataset.location, &partition_columns, batch_id, &merged)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_frame(id_values: &[(i32, &str, &str, &str)]) -> Frame {
        let mut frame = Frame::new(vec![
            "id".to_string(),
            "name".to_string(),
            "eff_end_dt".to_string(),
            "sys_checksum".to_string(),
        ]);
        for (id, name, eff_end_dt, checksum) in id_values {
            frame.rows.push(vec![
                CellValue::I32(*id),
                CellValue::Str(name.to_string()),
                CellValue::Str(eff_end_dt.to_string()),
                CellValue::Str(checksum.to_string()),
            ]);
        }
        frame.columns.extend(["sys_del_flg".to_string(), "sys_modified_ts".to_string()]);
        for row in frame.rows.iter_mut() {
            row.push(CellValue::Str("N".to_string()));
            row.push(CellValue::Str("t0".to_string()));
        }
        frame
    }

    #[test]
    fn parse_extra_values_strips_quotes_from_literals() {
        let parsed = parse_extra_values("country='IN', tier=\"gold\"");
        assert_eq!(
            parsed,
            vec![("country".to_string(), "IN".to_string()), ("tier".to_string(), "gold".to_string())]
        );
    }

    #[test]
    fn add_literal_columns_sets_same_value_on_every_row() {
        let mut frame = Frame::new(vec!["id".to_string()]);
        frame.rows.push(vec![CellValue::I32(1)]);
        frame.rows.push(vec![CellValue::I32(2)]);

        add_literal_columns(&mut frame, &[("country".to_string(), "IN".to_string())]);

        assert_eq!(frame.columns, vec!["id".to_string(), "country".to_string()]);
        assert_eq!(frame.rows[0][1], CellValue::Str("IN".to_string()));
        assert_eq!(frame.rows[1][1], CellValue::Str("IN".to_string()));
    }

    #[test]
    fn select_declared_columns_reorders_and_drops_undeclared() {
        let mut frame = Frame::new(vec!["batch_id".to_string(), "name".to_string(), "id".to_string()]);
        frame.rows.push(vec![CellValue::I64(7), CellValue::Str("A".to_string()), CellValue::I32(1)]);

        let selected = select_declared_columns(frame, &["id".to_string(), "name".to_string()]).unwrap();

        assert_eq!(selected.columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(selected.rows[0], vec![CellValue::I32(1), CellValue::Str("A".to_string())]);
    }

    #[test]
    fn select_declared_columns_errors_when_a_declared_column_is_missing() {
        let frame = Frame::new(vec!["id".to_string()]);
        assert!(select_declared_columns(frame, &["id".to_string(), "name".to_string()]).is_err());
    }

    #[test]
    fn checksum_is_stable_for_identical_rows() {
        let row = vec![CellValue::I32(1), CellValue::Str("A".to_string())];
        assert_eq!(compute_checksum(&row, &[0, 1]), compute_checksum(&row, &[0, 1]));
    }

    #[test]
    fn checksum_differs_when_a_declared_column_changes() {
        let row_a = vec![CellValue::I32(1), CellValue::Str("A".to_string())];
        let row_b = vec![CellValue::I32(1), CellValue::Str("B".to_string())];
        assert_ne!(compute_checksum(&row_a, &[0, 1]), compute_checksum(&row_b, &[0, 1]));
    }

    #[test]
    fn merge_inserts_brand_new_key() {
        let mut gold = envelope_frame(&[]);
        let mut staging = Frame::new(vec!["id".to_string(), "name".to_string()]);
        staging.rows.push(vec![CellValue::I32(1), CellValue::Str("A".to_string())]);
        let staging = synthesize_scd2_envelope(&staging, 1, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), "t1");

        merge_scd2(&mut gold, &staging, &["id"]).unwrap();
        assert_eq!(gold.rows.len(), 1);
    }

    #[test]
    fn merge_closes_old_row_and_inserts_new_version_on_checksum_change() {
        let mut gold = envelope_frame(&[(1, "A", EFF_END_DT_SENTINEL, "old-checksum")]);
        let mut staging = Frame::new(vec!["id".to_string(), "name".to_string()]);
        staging.rows.push(vec![CellValue::I32(1), CellValue::Str("B".to_string())]);
        let staging = synthesize_scd2_envelope(&staging, 2, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), "t2");

        merge_scd2(&mut gold, &staging, &["id"]).unwrap();

        assert_eq!(gold.rows.len(), 2);
        let active_count = gold
            .rows
            .iter()
            .filter(|r| r[gold.column_index("eff_end_dt").unwrap()].to_display_string() == EFF_END_DT_SENTINEL)
            .count();
        assert_eq!(active_count, 1);
    }

    #[test]
    fn merge_is_a_no_op_when_checksum_is_unchanged() {
        let row = vec![CellValue::I32(1), CellValue::Str("A".to_string())];
        let checksum = compute_checksum(&row, &[0, 1]);
        let mut gold = envelope_frame(&[(1, "A", EFF_END_DT_SENTINEL, &checksum)]);
        let mut staging = Frame::new(vec!["id".to_string(), "name".to_string()]);
        staging.rows.push(row);
        let staging = synthesize_scd2_envelope(&staging, 2, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(), "t2");

        merge_scd2(&mut gold, &staging, &["id"]).unwrap();
        assert_eq!(gold.rows.len(), 1);
    }
}
