//! Idempotent DDL for the control-plane tables.
//!
//! Run once at `CatalogStore::open`. No triggers, no cascades:
//! the Catalog Store owns these rows exclusively and nothing else mutates them
//! out of band.

pub const CREATE_TABLES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS dataset_master (
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    dataset_name TEXT NOT NULL,
    layer TEXT NOT NULL,
    location TEXT NOT NULL,
    file_pattern TEXT,
    file_pattern_static TEXT NOT NULL DEFAULT 'N',
    delimiter TEXT,
    partition_columns TEXT,
    staging_location TEXT,
    staging_partition_columns TEXT,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    PRIMARY KEY (process_id, dataset_id, layer)
);

CREATE TABLE IF NOT EXISTS column_metadata (
    dataset_id INTEGER NOT NULL,
    column_name TEXT NOT NULL,
    source_column_name TEXT,
    column_type TEXT NOT NULL,
    date_format TEXT,
    column_json_mapping TEXT,
    column_order INTEGER NOT NULL,
    dashboard_flag TEXT,
    PRIMARY KEY (dataset_id, column_name)
);

CREATE TABLE IF NOT EXISTS acquisition_connection_master (
    connection_id INTEGER NOT NULL,
    platform TEXT NOT NULL,
    system TEXT NOT NULL,
    connection_config TEXT NOT NULL,
    ssh_private_key TEXT,
    PRIMARY KEY (platform, system)
);

CREATE TABLE IF NOT EXISTS api_connection_dtl (
    connection_id INTEGER NOT NULL,
    seq_no INTEGER NOT NULL,
    step_type TEXT NOT NULL,
    method TEXT,
    url TEXT,
    token_url TEXT,
    auth_type TEXT,
    token_type TEXT,
    token_path TEXT,
    client_id TEXT,
    client_secret TEXT,
    username TEXT,
    password TEXT,
    issuer TEXT,
    scope TEXT,
    private_key TEXT,
    headers TEXT,
    params TEXT,
    data TEXT,
    json_body TEXT,
    body_values TEXT,
    PRIMARY KEY (connection_id, seq_no)
);

CREATE TABLE IF NOT EXISTS acquisition_detail (
    process_id INTEGER NOT NULL,
    pre_ingestion_dataset_id INTEGER NOT NULL,
    outbound_source_platform TEXT NOT NULL,
    outbound_source_system TEXT,
    outbound_source_location TEXT NOT NULL,
    outbound_source_file_pattern TEXT,
    outbound_source_file_pattern_static TEXT NOT NULL DEFAULT 'N',
    inbound_location TEXT NOT NULL,
    inbound_file_pattern TEXT,
    delimiter TEXT,
    query TEXT,
    columns TEXT,
    PRIMARY KEY (process_id, pre_ingestion_dataset_id)
);

CREATE TABLE IF NOT EXISTS standardization_dtl (
    dataset_id INTEGER NOT NULL,
    column_name TEXT NOT NULL,
    seq_no INTEGER NOT NULL,
    function_name TEXT NOT NULL,
    parameters TEXT,
    PRIMARY KEY (dataset_id, column_name, seq_no)
);

CREATE TABLE IF NOT EXISTS dqm_master_dtl (
    qc_id INTEGER PRIMARY KEY,
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    column_name TEXT NOT NULL,
    qc_type TEXT NOT NULL,
    parameters TEXT,
    criticality TEXT NOT NULL,
    threshold_pct REAL NOT NULL DEFAULT 0,
    is_active BOOLEAN NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS transformation_dependency_master (
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    dependent_dataset_id INTEGER NOT NULL,
    transformation_step INTEGER NOT NULL,
    transformation_type TEXT NOT NULL,
    staging_table TEXT,
    join_how TEXT,
    left_table_columns TEXT,
    right_table_columns TEXT,
    primary_keys TEXT,
    extra_values TEXT,
    custom_transformation_query TEXT,
    PRIMARY KEY (process_id, dataset_id, dependent_dataset_id)
);

CREATE TABLE IF NOT EXISTS log_acquisition (
    seq_no INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL,
    run_date DATE NOT NULL,
    process_id INTEGER NOT NULL,
    pre_ingestion_dataset_id INTEGER NOT NULL,
    outbound_source_location TEXT NOT NULL,
    inbound_file_location TEXT,
    status TEXT NOT NULL,
    exception_details TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP
);

CREATE TABLE IF NOT EXISTS log_raw_process (
    file_id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL,
    run_date DATE NOT NULL,
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    inbound_file_location TEXT NOT NULL,
    status TEXT NOT NULL,
    exception_details TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP
);

CREATE TABLE IF NOT EXISTS log_standardization (
    seq_no INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL,
    run_date DATE NOT NULL,
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    exception_details TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP
);

CREATE TABLE IF NOT EXISTS log_dqm (
    seq_no INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL,
    run_date DATE NOT NULL,
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    qc_id INTEGER NOT NULL,
    qc_type TEXT NOT NULL,
    total_count INTEGER NOT NULL,
    error_count INTEGER NOT NULL,
    status TEXT NOT NULL,
    exception_details TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP
);

CREATE TABLE IF NOT EXISTS log_transformation (
    seq_no INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL,
    run_date DATE NOT NULL,
    process_id INTEGER NOT NULL,
    dataset_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    exception_details TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP
);
"#;

/// Run the idempotent DDL batch against the given pool.
pub async fn ensure_schema(pool: &crate::pool::CatalogPool) -> crate::error::Result<()> {
    for statement in CREATE_TABLES_SQL.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
