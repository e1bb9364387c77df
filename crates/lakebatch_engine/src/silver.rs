//! Silver Engine: rename → cast → standardize → write standardized →
//! quality gate → write staging.
//!
//! This module wires the stateless [`lakebatch_core`] components (schema casting,
//! standardization rules, DQM rules) into the per-batch pass the Stage Coordinator
//! drives. A rule's outcome is reported as [`RuleOutcome`]; the caller is
//! responsible for the catalog logging and for stopping the batch on
//! [`crate::error::EngineError::CriticalDqmBreach`].

use chrono::{NaiveDate, Utc};

use lakebatch_catalog::{CatalogStore, ColumnMetadata, DatasetMaster, DqmMasterDtl, RunStatus, StandardizationDtl};
use lakebatch_core::value::CellValue;
use lakebatch_core::{dqm, schema_caster, standardize};

use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::snapshot;

const BRONZE_LAYER: &str = "BRONZE";

/// One column's rename + semantic-type + optional date format, straight off
/// `ctl_dataset_column`.
pub struct ColumnCastSpec {
    pub source_column_name: String,
    pub column_name: String,
    pub column_data_type: String,
    pub column_date_format: Option<String>,
}

/// One standardization rule, straight off `ctl_data_standardisation_dtl`.
pub struct StandardizationRule {
    pub column_name: String,
    pub function_name: String,
    pub function_params: serde_json::Value,
}

/// Rename raw source columns to their declared names and cast every value to its
/// declared semantic type. `batch_id`, bronze's own non-business column, is
/// carried through unchanged onto every write path rather than dropped here,
/// since the staging and gold writes downstream both need it too.
pub fn rename_and_cast(raw: Frame, specs: &[ColumnCastSpec]) -> Result<Frame> {
    let mut columns: Vec<String> = specs.iter().map(|s| s.column_name.clone()).collect();
    columns.push("batch_id".to_string());
    let mut out = Frame::new(columns);

    let source_indices: Vec<usize> = specs
        .iter()
        .map(|s| {
            raw.column_index(&s.source_column_name)
                .ok_or_else(|| EngineError::Other(format!("unknown source column '{}'", s.source_column_name)))
        })
        .collect::<Result<_>>()?;
    let batch_id_idx = raw
        .column_index("batch_id")
        .ok_or_else(|| EngineError::Other("landing snapshot missing batch_id column".to_string()))?;

    for row in &raw.rows {
        let mut new_row = Vec::with_capacity(specs.len() + 1);
        for (spec, &src_idx) in specs.iter().zip(&source_indices) {
            let raw_value = row[src_idx].to_display_string();
            let cast = schema_caster::cast_field(
                &spec.column_name,
                &raw_value,
                &spec.column_data_type,
                spec.column_date_format.as_deref(),
            )?;
            new_row.push(cast);
        }
        new_row.push(row[batch_id_idx].clone());
        out.rows.push(new_row);
    }
    Ok(out)
}

/// Apply every standardization rule in order, each against its own column.
pub fn standardize_frame(frame: &mut Frame, rules: &[StandardizationRule]) -> Result<()> {
    for rule in rules {
        let idx = frame
            .column_index(&rule.column_name)
            .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
        for row in frame.rows.iter_mut() {
            if row[idx].is_null() {
                continue;
            }
            let raw = row[idx].to_display_string();
            let standardized = standardize::apply_rule(&rule.function_name, &raw, &rule.function_params)?;
            row[idx] = CellValue::Str(standardized);
        }
    }
    Ok(())
}

/// One DQM rule's result after classification.
pub struct RuleOutcome {
    pub qc_type: String,
    pub column_name: String,
    pub total_count: usize,
    pub failure_count: usize,
    pub failure_pct: f64,
    pub verdict: dqm::Verdict,
}

/// One `ctl_dqm_master_dtl` row.
pub struct DqmRule {
    pub qc_type: String,
    pub column_name: String,
    pub qc_param: Option<String>,
    pub criticality: String,
    pub criticality_threshold_pct: f64,
}

/// Run every DQM rule against `frame` in order, filtering failed rows out as each
/// rule completes (so later rules see only rows that already passed). Returns the
/// per-rule outcome list; the first [`dqm::Verdict::Failed`] should stop the batch.
pub fn run_quality_gate(frame: &mut Frame, rules: &[DqmRule]) -> Result<Vec<RuleOutcome>> {
    let mut outcomes = Vec::with_capacity(rules.len());

    for rule in rules {
        let total_count = frame.row_count();

        let mask = match rule.qc_type.to_ascii_lowercase().as_str() {
            "null" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let values: Vec<CellValue> = frame.rows.iter().map(|r| r[idx].clone()).collect();
                dqm::null_check(&values)
            }
            "unique" => {
                let key_idxs: Vec<usize> = rule
                    .column_name
                    .split(',')
                    .map(|c| {
                        frame
                            .column_index(c.trim())
                            .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", c.trim())))
                    })
                    .collect::<Result<_>>()?;
                let keys: Vec<Vec<String>> = frame
                    .rows
                    .iter()
                    .map(|r| key_idxs.iter().map(|&i| r[i].to_display_string()).collect())
                    .collect();
                dqm::unique_check(&keys)
            }
            "length" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let parsed: serde_json::Value = serde_json::from_str(rule.qc_param.as_deref().unwrap_or("{}"))
                    .map_err(lakebatch_core::CoreError::from)?;
                let expression = parsed.get("expression").and_then(|v| v.as_str()).unwrap_or("==");
                let expected = parsed.get("value").and_then(|v| v.as_i64()).unwrap_or(0);
                let values: Vec<String> = frame.rows.iter().map(|r| r[idx].to_display_string()).collect();
                dqm::length_check(&values, expression, expected)?
            }
            "date" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let values: Vec<String> = frame.rows.iter().map(|r| r[idx].to_display_string()).collect();
                dqm::date_check(&values, rule.qc_param.as_deref().unwrap_or_default())?
            }
            "integer" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let values: Vec<String> = frame.rows.iter().map(|r| r[idx].to_display_string()).collect();
                dqm::integer_check(&values)
            }
            "decimal" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let values: Vec<String> = frame.rows.iter().map(|r| r[idx].to_display_string()).collect();
                dqm::decimal_check(&values)
            }
            "domain" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let values: Vec<String> = frame.rows.iter().map(|r| r[idx].to_display_string()).collect();
                dqm::domain_check(&values, rule.qc_param.as_deref().unwrap_or_default())
            }
            "custom" => {
                let idx = frame
                    .column_index(&rule.column_name)
                    .ok_or_else(|| EngineError::Other(format!("unknown column '{}'", rule.column_name)))?;
                let values: Vec<String> = frame.rows.iter().map(|r| r[idx].to_display_string()).collect();
                dqm::custom_check(&values, rule.qc_param.as_deref().unwrap_or_default())?
            }
            other => return Err(EngineError::Other(format!("unknown qc_type '{other}'"))),
        };

        let failure_count = mask.iter().filter(|pass| !**pass).count();
        let critical = rule.criticality.eq_ignore_ascii_case("C");
        let (verdict, failure_pct) = dqm::classify(total_count, failure_count, critical, rule.criticality_threshold_pct);

        if verdict == dqm::Verdict::Failed {
            outcomes.push(RuleOutcome {
                qc_type: rule.qc_type.clone(),
                column_name: rule.column_name.clone(),
                total_count,
                failure_count,
                failure_pct,
                verdict,
            });
            return Err(EngineError::CriticalDqmBreach {
                dataset_id: 0,
                qc_type: rule.qc_type.clone(),
                failed_pct: failure_pct,
                threshold_pct: rule.criticality_threshold_pct,
            });
        }

        frame.filter_rows(&mask);
        outcomes.push(RuleOutcome {
            qc_type: rule.qc_type.clone(),
            column_name: rule.column_name.clone(),
            total_count,
            failure_count,
            failure_pct,
            verdict,
        });
    }

    Ok(outcomes)
}

fn column_cast_specs(column_metadata: &[ColumnMetadata]) -> Vec<ColumnCastSpec> {
    column_metadata
        .iter()
        .map(|c| ColumnCastSpec {
            source_column_name: c.source_column_name.clone().unwrap_or_else(|| c.column_name.clone()),
            column_name: c.column_name.clone(),
            column_data_type: c.column_type.clone(),
            column_date_format: c.date_format.clone(),
        })
        .collect()
}

fn standardization_rules(rules: &[StandardizationDtl]) -> Result<Vec<StandardizationRule>> {
    rules
        .iter()
        .map(|r| {
            let function_params = match &r.parameters {
                Some(raw) => serde_json::from_str(raw).map_err(lakebatch_core::CoreError::from)?,
                None => serde_json::Value::Null,
            };
            Ok(StandardizationRule {
                column_name: r.column_name.clone(),
                function_name: r.function_name.clone(),
                function_params,
            })
        })
        .collect()
}

fn dqm_rules(rules: &[DqmMasterDtl]) -> Vec<DqmRule> {
    rules
        .iter()
        .map(|r| DqmRule {
            qc_type: r.qc_type.clone(),
            column_name: r.column_name.clone(),
            qc_param: r.parameters.clone(),
            criticality: r.criticality.clone(),
            criticality_threshold_pct: r.threshold_pct,
        })
        .collect()
}

/// Run one silver dataset's pass for `batch_id`: read the bronze counterpart's
/// landing snapshot, rename/cast/standardize it, write the standardized snapshot to
/// this dataset's `location`, then quality-gate the result read back from there and
/// write the surviving rows to the distinct `staging_location`. Each of the two
/// writes is logged separately (`log_standardization`, `log_dqm`), matching how the
/// Stage Coordinator resumes a batch that crashed between the two — and keeping
/// them as genuinely separate versioned snapshot tables means a crash between the
/// two writes leaves the pre-gate standardized snapshot intact for inspection.
pub async fn run_silver_for_batch(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    batch_id: i64,
    today: NaiveDate,
) -> Result<()> {
    let standardization_start = Utc::now().naive_utc();
    let standardization_outcome =
        run_standardization_for_batch(store, process_id, dataset, batch_id).await;

    match &standardization_outcome {
        Ok(()) => {
            store
                .insert_log_standardization(batch_id, today, process_id, dataset.dataset_id, RunStatus::Succeeded, None, standardization_start)
                .await?;
        }
        Err(err) => {
            store
                .insert_log_standardization(
                    batch_id,
                    today,
                    process_id,
                    dataset.dataset_id,
                    RunStatus::Failed,
                    Some(err.to_string().as_str()),
                    standardization_start,
                )
                .await?;
            return standardization_outcome;
        }
    }

    run_dqm_for_batch(store, process_id, dataset, batch_id, today).await
}

async fn run_standardization_for_batch(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    batch_id: i64,
) -> Result<()> {
    let bronze_dataset = store.dataset(process_id, dataset.dataset_id, BRONZE_LAYER).await?;
    let landed = snapshot::read_snapshot_for_batch(&bronze_dataset.location, batch_id)?;

    let column_metadata = store.column_metadata(dataset.dataset_id).await?;
    let specs = column_cast_specs(&column_metadata);
    let mut frame = rename_and_cast(landed, &specs)?;

    let rules = store.standardization_rules(dataset.dataset_id).await?;
    let rules = standardization_rules(&rules)?;
    standardize_frame(&mut frame, &rules)?;

    let partition_columns = dataset.partition_column_list();
    snapshot::write_snapshot(&dataset.location, &partition_columns, batch_id, &frame)?;
    Ok(())
}

/// Run only the quality-gate half of a silver pass, for resuming a batch whose
/// standardization already succeeded in a prior, interrupted run (the case
/// `CatalogStore::unprocessed_for_dqm` detects).
pub async fn run_dqm_for_batch(
    store: &CatalogStore,
    process_id: i64,
    dataset: &DatasetMaster,
    batch_id: i64,
    today: NaiveDate,
) -> Result<()> {
    let start = Utc::now().naive_utc();
    let mut frame = snapshot::read_snapshot_for_batch(&dataset.location, batch_id)?;

    let raw_rules = store.dqm_rules(process_id, dataset.dataset_id).await?;
    let rules = dqm_rules(&raw_rules);

    let staging_location = dataset
        .staging_location
        .as_deref()
        .ok_or_else(|| EngineError::Other(format!("silver dataset {} has no staging_location", dataset.dataset_id)))?;

    match run_quality_gate(&mut frame, &rules) {
        Ok(outcomes) => {
            for (raw_rule, outcome) in raw_rules.iter().zip(outcomes.iter()) {
                store
                    .insert_log_dqm(
                        batch_id,
                        today,
                        process_id,
                        dataset.dataset_id,
                        raw_rule.qc_id,
                        &outcome.qc_type,
                        outcome.total_count as i64,
                        outcome.failure_count as i64,
                        RunStatus::Succeeded,
                        None,
                        start,
                    )
                    .await?;
            }
            let partition_columns = dataset.staging_partition_column_list();
            snapshot::write_snapshot(staging_location, &partition_columns, batch_id, &frame)?;
            Ok(())
        }
        Err(EngineError::CriticalDqmBreach { qc_type, failed_pct, threshold_pct, .. }) => {
            let qc_id = raw_rules.iter().find(|r| r.qc_type == qc_type).map(|r| r.qc_id).unwrap_or_default();
            store
                .insert_log_dqm(
                    batch_id,
                    today,
                    process_id,
                    dataset.dataset_id,
                    qc_id,
                    &qc_type,
                    0,
                    0,
                    RunStatus::Failed,
                    Some(format!("critical breach: {failed_pct:.2}% exceeds threshold {threshold_pct:.2}%").as_str()),
                    start,
                )
                .await?;
            Err(EngineError::CriticalDqmBreach {
                dataset_id: dataset.dataset_id,
                qc_type,
                failed_pct,
                threshold_pct,
            })
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_and_cast_applies_declared_types() {
        let mut raw = Frame::new(vec!["src_id".to_string(), "src_amt".to_string(), "batch_id".to_string()]);
        raw.rows.push(vec![CellValue::Str("42".into()), CellValue::Str("9.5".into()), CellValue::I64(123)]);

        let specs = vec![
            ColumnCastSpec {
                source_column_name: "src_id".into(),
                column_name: "id".into(),
                column_data_type: "integer".into(),
                column_date_format: None,
            },
            ColumnCastSpec {
                source_column_name: "src_amt".into(),
                column_name: "amount".into(),
                column_data_type: "double".into(),
                column_date_format: None,
            },
        ];

        let cast = rename_and_cast(raw, &specs).unwrap();
        assert_eq!(cast.columns, vec!["id".to_string(), "amount".to_string(), "batch_id".to_string()]);
        assert_eq!(cast.rows[0][0], CellValue::I32(42));
        assert_eq!(cast.rows[0][1], CellValue::F64(9.5));
        assert_eq!(cast.rows[0][2], CellValue::I64(123));
    }

    #[test]
    fn rename_and_cast_errors_without_a_batch_id_column() {
        let mut raw = Frame::new(vec!["src_id".to_string()]);
        raw.rows.push(vec![CellValue::Str("42".into())]);
        let specs = vec![ColumnCastSpec {
            source_column_name: "src_id".into(),
            column_name: "id".into(),
            column_data_type: "integer".into(),
            column_date_format: None,
        }];
        assert!(rename_and_cast(raw, &specs).is_err());
    }

    #[test]
    fn quality_gate_dedupes_on_a_composite_unique_key() {
        let mut frame = Frame::new(vec!["id".to_string(), "region".to_string()]);
        frame.rows.push(vec![CellValue::Str("1".into()), CellValue::Str("IN".into())]);
        frame.rows.push(vec![CellValue::Str("1".into()), CellValue::Str("US".into())]);
        frame.rows.push(vec![CellValue::Str("1".into()), CellValue::Str("IN".into())]);

        let rules = vec![DqmRule {
            qc_type: "unique".into(),
            column_name: "id,region".into(),
            qc_param: None,
            criticality: "NC".into(),
            criticality_threshold_pct: 0.0,
        }];

        let outcomes = run_quality_gate(&mut frame, &rules).unwrap();
        assert_eq!(outcomes[0].failure_count, 1);
        assert_eq!(frame.row_count(), 2);
    }

    #[test]
    fn quality_gate_filters_failing_rows_for_non_critical_rules() {
        let mut frame = Frame::new(vec!["id".to_string()]);
        frame.rows.push(vec![CellValue::Str("1".into())]);
        frame.rows.push(vec![CellValue::Str("abc".into())]);

        let rules = vec![DqmRule {
            qc_type: "integer".into(),
            column_name: "id".into(),
            qc_param: None,
            criticality: "NC".into(),
            criticality_threshold_pct: 0.0,
        }];

        let outcomes = run_quality_gate(&mut frame, &rules).unwrap();
        assert_eq!(outcomes[0].failure_count, 1);
        assert_eq!(frame.row_count(), 1);
    }

    #[test]
    fn quality_gate_stops_the_batch_on_critical_breach() {
        let mut frame = Frame::new(vec!["id".to_string()]);
        frame.rows.push(vec![CellValue::Str("abc".into())]);

        let rules = vec![DqmRule {
            qc_type: "integer".into(),
            column_name: "id".into(),
            qc_param: None,
            criticality: "C".into(),
            criticality_threshold_pct: 10.0,
        }];

        let err = run_quality_gate(&mut frame, &rules).unwrap_err();
        assert!(matches!(err, EngineError::CriticalDqmBreach { .. }));
    }
}
