//! Bronze Engine: two sequential sub-stages, each itself run under the
//! Stage Coordinator, that turn a source system's data into a versioned landing
//! snapshot tagged by a freshly minted `batch_id`.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use lakebatch_catalog::{AcquisitionConnectionMaster, AcquisitionDetail, CatalogStore, ColumnMetadata, DatasetMaster, RunStatus};
use lakebatch_core::{json_mapper, CellValue, CoreError};
use lakebatch_extract::api::{ApiStep, ResponseStep, TokenStep};
use lakebatch_extract::context::{Deduper, ExtractionContext};
use lakebatch_extract::object_store::AcquiredFile;
use lakebatch_extract::saas::SaasSession;
use lakebatch_extract::sftp::SftpConnection;
use lakebatch_extract::{database, object_store, sftp, SourcePlatform};

use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::snapshot;

/// Sub-stage B1 for one `acquisition_detail` row: dispatch to the right extractor,
/// land its output in the inbound zone, and write one `log_acquisition` row per
/// attempt — one `SUCCEEDED` row per landed object, or one `FAILED` row for the
/// whole attempt.
pub async fn run_b1(
    store: &CatalogStore,
    ctx: &ExtractionContext,
    process_id: i64,
    detail: &AcquisitionDetail,
    connection: &AcquisitionConnectionMaster,
    column_metadata: &[ColumnMetadata],
    today: NaiveDate,
) -> Result<Vec<AcquiredFile>> {
    let start = Utc::now().naive_utc();
    let known = store
        .acquired_inbound_locations(process_id, detail.pre_ingestion_dataset_id)
        .await?;
    let mut deduper = Deduper::from_known(known);

    let outcome = dispatch_b1(store, ctx, detail, connection, column_metadata, &mut deduper, today).await;

    match &outcome {
        Ok(files) => {
            for file in files {
                store
                    .insert_log_acquisition(
                        lakebatch_catalog::mint_batch_id(Utc::now()),
                        today,
                        process_id,
                        detail.pre_ingestion_dataset_id,
                        &detail.outbound_source_location,
                        Some(file.inbound_location.as_str()),
                        RunStatus::Succeeded,
                        None,
                        start,
                    )
                    .await?;
            }
        }
        Err(err) => {
            store
                .insert_log_acquisition(
                    lakebatch_catalog::mint_batch_id(Utc::now()),
                    today,
                    process_id,
                    detail.pre_ingestion_dataset_id,
                    &detail.outbound_source_location,
                    None,
                    RunStatus::Failed,
                    Some(err.to_string().as_str()),
                    start,
                )
                .await?;
        }
    }
    outcome
}

async fn dispatch_b1(
    store: &CatalogStore,
    ctx: &ExtractionContext,
    detail: &AcquisitionDetail,
    connection: &AcquisitionConnectionMaster,
    column_metadata: &[ColumnMetadata],
    deduper: &mut Deduper,
    today: NaiveDate,
) -> Result<Vec<AcquiredFile>> {
    let platform = SourcePlatform::from_tag(&detail.outbound_source_platform)?;
    let pattern = detail.outbound_source_file_pattern.as_deref().unwrap_or("*");
    let delimiter = detail.delimiter.as_deref().and_then(|d| d.chars().next()).unwrap_or(',');

    match platform {
        SourcePlatform::Sftp => {
            let config = parse_connection_config(connection)?;
            let conn = SftpConnection {
                host: config.get("host").and_then(Value::as_str).unwrap_or_default().to_string(),
                port: config.get("port").and_then(Value::as_u64).unwrap_or(22) as u16,
                username: config.get("username").and_then(Value::as_str).unwrap_or_default().to_string(),
                password: config.get("password").and_then(Value::as_str).map(str::to_string),
                ssh_private_key: connection.ssh_private_key.clone(),
                remote_directory: detail.outbound_source_location.clone(),
            };
            let local_dir = std::path::PathBuf::from(format!("{}-{}", ctx.env, detail.inbound_location));
            sftp::acquire(&conn, &local_dir, &ctx.env, pattern, detail.is_static_pattern(), deduper).map_err(EngineError::from)
        }

        SourcePlatform::ObjectStore => object_store::acquire(
            ctx,
            &detail.outbound_source_location,
            &detail.inbound_location,
            pattern,
            detail.is_static_pattern(),
            deduper,
        )
        .await
        .map_err(EngineError::from),

        SourcePlatform::Database => {
            let config = parse_connection_config(connection)?;
            let query = detail
                .query
                .as_deref()
                .ok_or_else(|| EngineError::Other("database acquisition detail missing query".to_string()))?;
            let rows = database::extract_rows(&config, query).await?;
            let columns: Vec<String> = rows.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
            let text = database::rows_to_delimited_text(&rows, &columns, delimiter);
            let basename = format!("{}.txt", detail.pre_ingestion_dataset_id);
            let file = object_store::put_inbound_object(ctx, &detail.inbound_location, &basename, text).await?;
            Ok(vec![file])
        }

        SourcePlatform::Api => {
            let steps = build_api_steps(&store.api_workflow_steps(connection.connection_id).await?)?;
            let response = lakebatch_extract::api::execute_workflow(&ctx.http, &steps, today).await?;

            let mapping: Vec<(String, String)> = column_metadata
                .iter()
                .filter_map(|c| c.column_json_mapping.clone().map(|path| (c.column_name.clone(), path)))
                .collect();
            let rows = json_mapper::map_rows(&mapping, &response)?;
            let columns: Vec<String> = mapping.iter().map(|(name, _)| name.clone()).collect();
            let text = json_rows_to_csv(&rows, &columns, delimiter);
            let basename = format!("{}.csv", detail.pre_ingestion_dataset_id);
            let file = object_store::put_inbound_object(ctx, &detail.inbound_location, &basename, text).await?;
            Ok(vec![file])
        }

        SourcePlatform::Saas => {
            let config = parse_connection_config(connection)?;
            let domain = config
                .get("domain")
                .and_then(Value::as_str)
                .ok_or_else(|| EngineError::Other("saas connection_config missing 'domain'".to_string()))?;
            let client_id = config.get("client_id").and_then(Value::as_str).unwrap_or_default();
            let client_secret = config.get("client_secret").and_then(Value::as_str).unwrap_or_default();

            let session = SaasSession::authenticate(&ctx.http, domain, client_id, client_secret).await?;
            let columns: Vec<String> = detail
                .columns
                .as_deref()
                .map(|csv| csv.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| {
                    column_metadata
                        .iter()
                        .map(|c| c.source_column_name.clone().unwrap_or_else(|| c.column_name.clone()))
                        .collect()
                });
            let records = session.query(&ctx.http, &columns, &detail.outbound_source_location).await?;
            let text = value_rows_to_csv(&records, &columns, delimiter);
            let basename = format!("{}.csv", detail.pre_ingestion_dataset_id);
            let file = object_store::put_inbound_object(ctx, &detail.inbound_location, &basename, text).await?;
            Ok(vec![file])
        }
    }
}

fn parse_connection_config(connection: &AcquisitionConnectionMaster) -> Result<Value> {
    serde_json::from_str(&connection.connection_config).map_err(|e| EngineError::from(CoreError::from(e)))
}

fn build_api_steps(rows: &[lakebatch_catalog::ApiConnectionDtl]) -> Result<Vec<ApiStep>> {
    rows.iter()
        .map(|row| match row.step_type.as_str() {
            "TOKEN" => Ok(ApiStep::Token(TokenStep {
                auth_type: row.auth_type.clone().unwrap_or_default(),
                method: row.method.clone(),
                token_url: row.token_url.clone(),
                token_type: row.token_type.clone(),
                token_path: row.token_path.clone(),
                client_id: row.client_id.clone(),
                client_secret: row.client_secret.clone(),
                username: row.username.clone(),
                password: row.password.clone(),
                issuer: row.issuer.clone(),
                scope: row.scope.clone(),
                private_key: row.private_key.clone(),
            })),
            "RESPONSE" => Ok(ApiStep::Response(ResponseStep {
                method: row.method.clone(),
                url: row
                    .url
                    .clone()
                    .ok_or_else(|| EngineError::Other("RESPONSE step missing url".to_string()))?,
                headers: parse_string_map(row.headers.as_deref())?,
                params: parse_string_map(row.params.as_deref())?,
                data: parse_optional_value(row.data.as_deref()),
                json_body: parse_optional_value(row.json_body.as_deref()),
                body_values: parse_body_values(row.body_values.as_deref())?,
            })),
            other => Err(EngineError::Other(format!("unknown api_connection_dtl step_type '{other}'"))),
        })
        .collect()
}

fn parse_string_map(raw: Option<&str>) -> Result<HashMap<String, String>> {
    match raw {
        None => Ok(HashMap::new()),
        Some(text) => serde_json::from_str(text).map_err(|e| EngineError::from(CoreError::from(e))),
    }
}

fn parse_optional_value(raw: Option<&str>) -> Value {
    raw.and_then(|text| serde_json::from_str(text).ok()).unwrap_or(Value::Null)
}

fn parse_body_values(raw: Option<&str>) -> Result<Vec<HashMap<String, Vec<String>>>> {
    match raw {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text).map_err(|e| EngineError::from(CoreError::from(e))),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_rows_to_csv(rows: &[HashMap<String, Value>], columns: &[String], delimiter: char) -> String {
    let mut out = String::new();
    out.push_str(&columns.join(&delimiter.to_string()));
    out.push('\n');
    for row in rows {
        let line: Vec<String> = columns.iter().map(|c| row.get(c).map(cell_text).unwrap_or_default()).collect();
        out.push_str(&line.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

fn value_rows_to_csv(rows: &[Value], columns: &[String], delimiter: char) -> String {
    let mut out = String::new();
    out.push_str(&columns.join(&delimiter.to_string()));
    out.push('\n');
    for row in rows {
        let line: Vec<String> = columns.iter().map(|c| row.get(c).map(cell_text).unwrap_or_default()).collect();
        out.push_str(&line.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

/// Sub-stage B2 for one bronze dataset: list undigested inbound objects, mint a
/// fresh `batch_id` per object, append it as a column, and write each as a new
/// landing snapshot batch. Returns the minted `batch_id`s.
pub async fn run_b2(
    store: &CatalogStore,
    ctx: &ExtractionContext,
    process_id: i64,
    dataset: &DatasetMaster,
    detail: &AcquisitionDetail,
    today: NaiveDate,
) -> Result<Vec<i64>> {
    let start = Utc::now().naive_utc();
    let known: HashSet<String> = store
        .landed_inbound_locations(process_id, dataset.dataset_id)
        .await?
        .into_iter()
        .collect();

    let pattern = detail.inbound_file_pattern.as_deref().unwrap_or("*");
    let found = object_store::list_and_read_inbound(ctx, &detail.inbound_location, pattern, false, &known).await?;

    if found.is_empty() {
        return Err(EngineError::NoUnprocessedFiles {
            dataset_id: dataset.dataset_id,
            stage: "bronze B2",
        });
    }

    let delimiter = dataset
        .delimiter
        .as_deref()
        .or(detail.delimiter.as_deref())
        .and_then(|d| d.chars().next())
        .unwrap_or(',');
    let partition_columns = dataset.partition_column_list();

    let mut minted = Vec::with_capacity(found.len());
    for (file, text) in found {
        let batch_id = lakebatch_catalog::mint_batch_id(Utc::now());
        let mut frame = parse_delimited_text(&text, delimiter);
        frame.columns.push("batch_id".to_string());
        for row in frame.rows.iter_mut() {
            row.push(CellValue::I64(batch_id));
        }
        snapshot::write_snapshot(&dataset.location, &partition_columns, batch_id, &frame)?;
        store
            .insert_log_raw_process(
                batch_id,
                today,
                process_id,
                dataset.dataset_id,
                &file.inbound_location,
                RunStatus::Succeeded,
                None,
                start,
            )
            .await?;
        minted.push(batch_id);
    }
    Ok(minted)
}

fn parse_delimited_text(text: &str, delimiter: char) -> Frame {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    let columns: Vec<String> = header.split(delimiter).map(str::to_string).collect();
    let mut frame = Frame::new(columns);
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let row: Vec<CellValue> = line.split(delimiter).map(|s| CellValue::Str(s.to_string())).collect();
        frame.rows.push(row);
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimited_text_splits_header_and_rows() {
        let frame = parse_delimited_text("id,name\n1,Alice\n2,Bob\n", ',');
        assert_eq!(frame.columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(frame.rows.len(), 2);
    }

    #[test]
    fn json_rows_to_csv_renders_header_and_values() {
        let mut row = HashMap::new();
        row.insert("id".to_string(), Value::from(1));
        row.insert("name".to_string(), Value::String("Alice".to_string()));
        let text = json_rows_to_csv(&[row], &["id".to_string(), "name".to_string()], ',');
        assert_eq!(text, "id,name\n1,Alice\n");
    }
}
