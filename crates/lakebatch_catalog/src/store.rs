//! Typed accessors over the control-plane tables.
//!
//! One selector per read pattern, one insert per log table.
//! Every worker task acquires its own pool checkout per call; there is no
//! shared mutable cursor, matching the "each worker holds its own session"
//! resource policy.

use chrono::{NaiveDate, NaiveDateTime, Utc};

use crate::error::Result;
use crate::models::*;
use crate::pool::CatalogPool;

#[derive(Clone)]
pub struct CatalogStore {
    pool: CatalogPool,
}

impl CatalogStore {
    /// Open the catalog, creating control-plane tables if they do not yet exist.
    pub async fn open(config: &crate::pool::CatalogConfig) -> Result<Self> {
        let pool = crate::pool::create_pool(config).await?;
        crate::schema::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: CatalogPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &CatalogPool {
        &self.pool
    }

    // ---- ctl_ readers ----------------------------------------------------

    pub async fn datasets_for_layer(&self, process_id: i64, layer: &str) -> Result<Vec<DatasetMaster>> {
        let rows = sqlx::query_as::<_, DatasetMaster>(
            "SELECT process_id, dataset_id, dataset_name, layer, location, file_pattern, \
             file_pattern_static, delimiter, partition_columns, staging_location, \
             staging_partition_columns, is_active \
             FROM dataset_master WHERE process_id = ? AND layer = ? AND is_active = 1 \
             ORDER BY dataset_id ASC",
        )
        .bind(process_id)
        .bind(layer)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Look up one dataset's row in a specific layer. `dataset_id` is stable across a
    /// logical dataset's bronze/silver/gold rows — only `layer` (and therefore
    /// `location`) differs between them, which is how the Silver Engine finds its
    /// bronze counterpart and the Gold Engine finds its silver inputs.
    pub async fn dataset(&self, process_id: i64, dataset_id: i64, layer: &str) -> Result<DatasetMaster> {
        sqlx::query_as::<_, DatasetMaster>(
            "SELECT process_id, dataset_id, dataset_name, layer, location, file_pattern, \
             file_pattern_static, delimiter, partition_columns, staging_location, \
             staging_partition_columns, is_active \
             FROM dataset_master WHERE process_id = ? AND dataset_id = ? AND layer = ?",
        )
        .bind(process_id)
        .bind(dataset_id)
        .bind(layer)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| crate::error::CatalogError::not_found(format!("dataset_master {process_id}/{dataset_id}/{layer}")))
    }

    pub async fn column_metadata(&self, dataset_id: i64) -> Result<Vec<ColumnMetadata>> {
        let rows = sqlx::query_as::<_, ColumnMetadata>(
            "SELECT dataset_id, column_name, source_column_name, column_type, date_format, \
             column_json_mapping, column_order, dashboard_flag \
             FROM column_metadata WHERE dataset_id = ? ORDER BY column_order ASC",
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn acquisition_connection(&self, platform: &str, system: &str) -> Result<AcquisitionConnectionMaster> {
        sqlx::query_as::<_, AcquisitionConnectionMaster>(
            "SELECT connection_id, platform, system, connection_config, ssh_private_key \
             FROM acquisition_connection_master WHERE platform = ? AND system = ?",
        )
        .bind(platform)
        .bind(system)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| crate::error::CatalogError::not_found(format!("acquisition_connection_master {platform}/{system}")))
    }

    pub async fn api_workflow_steps(&self, connection_id: i64) -> Result<Vec<ApiConnectionDtl>> {
        let rows = sqlx::query_as::<_, ApiConnectionDtl>(
            "SELECT connection_id, seq_no, step_type, method, url, token_url, auth_type, \
             token_type, token_path, client_id, client_secret, username, password, issuer, \
             scope, private_key, headers, params, data, json_body, body_values \
             FROM api_connection_dtl WHERE connection_id = ? ORDER BY seq_no ASC",
        )
        .bind(connection_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn acquisition_details(&self, process_id: i64) -> Result<Vec<AcquisitionDetail>> {
        let rows = sqlx::query_as::<_, AcquisitionDetail>(
            "SELECT process_id, pre_ingestion_dataset_id, outbound_source_platform, \
             outbound_source_system, outbound_source_location, outbound_source_file_pattern, \
             outbound_source_file_pattern_static, inbound_location, inbound_file_pattern, \
             delimiter, query, columns \
             FROM acquisition_detail WHERE process_id = ? ORDER BY pre_ingestion_dataset_id ASC",
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn standardization_rules(&self, dataset_id: i64) -> Result<Vec<StandardizationDtl>> {
        let rows = sqlx::query_as::<_, StandardizationDtl>(
            "SELECT dataset_id, column_name, seq_no, function_name, parameters \
             FROM standardization_dtl WHERE dataset_id = ? ORDER BY column_name ASC, seq_no ASC",
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn dqm_rules(&self, process_id: i64, dataset_id: i64) -> Result<Vec<DqmMasterDtl>> {
        let rows = sqlx::query_as::<_, DqmMasterDtl>(
            "SELECT qc_id, process_id, dataset_id, column_name, qc_type, parameters, \
             criticality, threshold_pct, is_active \
             FROM dqm_master_dtl WHERE process_id = ? AND dataset_id = ? AND is_active = 1 \
             ORDER BY qc_id ASC",
        )
        .bind(process_id)
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn transformation_dependencies(
        &self,
        process_id: i64,
        dataset_id: i64,
    ) -> Result<Vec<TransformationDependencyMaster>> {
        let rows = sqlx::query_as::<_, TransformationDependencyMaster>(
            "SELECT process_id, dataset_id, dependent_dataset_id, transformation_step, \
             transformation_type, staging_table, join_how, left_table_columns, \
             right_table_columns, primary_keys, extra_values, custom_transformation_query \
             FROM transformation_dependency_master WHERE process_id = ? AND dataset_id = ? \
             ORDER BY transformation_step ASC",
        )
        .bind(process_id)
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- dedupe / resumability --------------------------------------------

    /// Inbound locations already landed successfully for this acquisition detail —
    /// the dedupe set a fresh B1 pass checks new candidates against.
    pub async fn acquired_inbound_locations(
        &self,
        process_id: i64,
        pre_ingestion_dataset_id: i64,
    ) -> Result<Vec<String>> {
        let rows: Vec<(Option<String>,)> = sqlx::query_as(
            "SELECT inbound_file_location FROM log_acquisition \
             WHERE process_id = ? AND pre_ingestion_dataset_id = ? AND status = 'SUCCEEDED'",
        )
        .bind(process_id)
        .bind(pre_ingestion_dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(|(loc,)| loc).collect())
    }

    /// Inbound objects already promoted to landing, for bronze sub-stage B2's dedupe.
    pub async fn landed_inbound_locations(&self, process_id: i64, dataset_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT inbound_file_location FROM log_raw_process \
             WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED'",
        )
        .bind(process_id)
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(loc,)| loc).collect())
    }

    /// batch_ids landed at bronze but not yet standardized, ascending — the
    /// "unprocessed at stage S" selector between `log_raw_process` and `log_standardization`.
    pub async fn unprocessed_for_standardization(&self, process_id: i64, dataset_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT batch_id FROM log_raw_process \
             WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED' \
             AND batch_id NOT IN ( \
                 SELECT batch_id FROM log_standardization \
                 WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED' \
             ) \
             ORDER BY batch_id ASC",
        )
        .bind(process_id)
        .bind(dataset_id)
        .bind(process_id)
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(b,)| b).collect())
    }

    /// batch_ids standardized but not yet quality-gated, ascending — covers a run that
    /// crashed between the two steps the Silver Engine performs per batch.
    pub async fn unprocessed_for_dqm(&self, process_id: i64, dataset_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT batch_id FROM log_standardization \
             WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED' \
             AND batch_id NOT IN ( \
                 SELECT batch_id FROM log_dqm \
                 WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED' \
             ) \
             ORDER BY batch_id ASC",
        )
        .bind(process_id)
        .bind(dataset_id)
        .bind(process_id)
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(b,)| b).collect())
    }

    /// batch_ids quality-gated at silver but not yet transformed to gold, ascending.
    pub async fn unprocessed_for_transformation(&self, process_id: i64, dataset_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT batch_id FROM log_dqm \
             WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED' \
             AND batch_id NOT IN ( \
                 SELECT batch_id FROM log_transformation \
                 WHERE process_id = ? AND dataset_id = ? AND status = 'SUCCEEDED' \
             ) \
             ORDER BY batch_id ASC",
        )
        .bind(process_id)
        .bind(dataset_id)
        .bind(process_id)
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(b,)| b).collect())
    }

    // ---- log_ writers ------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_log_acquisition(
        &self,
        batch_id: i64,
        run_date: NaiveDate,
        process_id: i64,
        pre_ingestion_dataset_id: i64,
        outbound_source_location: &str,
        inbound_file_location: Option<&str>,
        status: RunStatus,
        exception_details: Option<&str>,
        start_time: NaiveDateTime,
    ) -> Result<i64> {
        let end_time = matches!(status, RunStatus::Succeeded | RunStatus::Failed).then(|| Utc::now().naive_utc());
        let id = sqlx::query(
            "INSERT INTO log_acquisition \
             (batch_id, run_date, process_id, pre_ingestion_dataset_id, outbound_source_location, \
              inbound_file_location, status, exception_details, start_time, end_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(run_date)
        .bind(process_id)
        .bind(pre_ingestion_dataset_id)
        .bind(outbound_source_location)
        .bind(inbound_file_location)
        .bind(status.as_str())
        .bind(exception_details)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_log_raw_process(
        &self,
        batch_id: i64,
        run_date: NaiveDate,
        process_id: i64,
        dataset_id: i64,
        inbound_file_location: &str,
        status: RunStatus,
        exception_details: Option<&str>,
        start_time: NaiveDateTime,
    ) -> Result<i64> {
        let end_time = matches!(status, RunStatus::Succeeded | RunStatus::Failed).then(|| Utc::now().naive_utc());
        let id = sqlx::query(
            "INSERT INTO log_raw_process \
             (batch_id, run_date, process_id, dataset_id, inbound_file_location, status, \
              exception_details, start_time, end_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(run_date)
        .bind(process_id)
        .bind(dataset_id)
        .bind(inbound_file_location)
        .bind(status.as_str())
        .bind(exception_details)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_log_standardization(
        &self,
        batch_id: i64,
        run_date: NaiveDate,
        process_id: i64,
        dataset_id: i64,
        status: RunStatus,
        exception_details: Option<&str>,
        start_time: NaiveDateTime,
    ) -> Result<i64> {
        let end_time = matches!(status, RunStatus::Succeeded | RunStatus::Failed).then(|| Utc::now().naive_utc());
        let id = sqlx::query(
            "INSERT INTO log_standardization \
             (batch_id, run_date, process_id, dataset_id, status, exception_details, start_time, end_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(run_date)
        .bind(process_id)
        .bind(dataset_id)
        .bind(status.as_str())
        .bind(exception_details)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Insert a `log_dqm` row. Uses `dataset_master.process_id`, never `dataset_id`, for
    /// the `process_id` column.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_log_dqm(
        &self,
        batch_id: i64,
        run_date: NaiveDate,
        process_id: i64,
        dataset_id: i64,
        qc_id: i64,
        qc_type: &str,
        total_count: i64,
        error_count: i64,
        status: RunStatus,
        exception_details: Option<&str>,
        start_time: NaiveDateTime,
    ) -> Result<i64> {
        let end_time = matches!(status, RunStatus::Succeeded | RunStatus::Failed).then(|| Utc::now().naive_utc());
        let id = sqlx::query(
            "INSERT INTO log_dqm \
             (batch_id, run_date, process_id, dataset_id, qc_id, qc_type, total_count, \
              error_count, status, exception_details, start_time, end_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(run_date)
        .bind(process_id)
        .bind(dataset_id)
        .bind(qc_id)
        .bind(qc_type)
        .bind(total_count)
        .bind(error_count)
        .bind(status.as_str())
        .bind(exception_details)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_log_transformation(
        &self,
        batch_id: i64,
        run_date: NaiveDate,
        process_id: i64,
        dataset_id: i64,
        status: RunStatus,
        exception_details: Option<&str>,
        start_time: NaiveDateTime,
    ) -> Result<i64> {
        let end_time = matches!(status, RunStatus::Succeeded | RunStatus::Failed).then(|| Utc::now().naive_utc());
        let id = sqlx::query(
            "INSERT INTO log_transformation \
             (batch_id, run_date, process_id, dataset_id, status, exception_details, start_time, end_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(run_date)
        .bind(process_id)
        .bind(dataset_id)
        .bind(status.as_str())
        .bind(exception_details)
        .bind(start_time)
        .bind(end_time)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::CatalogConfig;

    async fn open_memory() -> CatalogStore {
        CatalogStore::open(&CatalogConfig::sqlite_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn unprocessed_for_standardization_excludes_already_standardized() {
        let store = open_memory().await;
        let now = Utc::now().naive_utc();
        let today = Utc::now().date_naive();

        store
            .insert_log_raw_process(1, today, 10, 1, "s3a://x/a.csv", RunStatus::Succeeded, None, now)
            .await
            .unwrap();
        store
            .insert_log_raw_process(2, today, 10, 1, "s3a://x/b.csv", RunStatus::Succeeded, None, now)
            .await
            .unwrap();
        store
            .insert_log_standardization(1, today, 10, 1, RunStatus::Succeeded, None, now)
            .await
            .unwrap();

        let pending = store.unprocessed_for_standardization(10, 1).await.unwrap();
        assert_eq!(pending, vec![2]);
    }

    #[tokio::test]
    async fn acquired_inbound_locations_only_counts_succeeded() {
        let store = open_memory().await;
        let now = Utc::now().naive_utc();
        let today = Utc::now().date_naive();

        store
            .insert_log_acquisition(1, today, 10, 5, "sftp://host/a.csv", Some("s3a://x/a.csv"), RunStatus::Succeeded, None, now)
            .await
            .unwrap();
        store
            .insert_log_acquisition(2, today, 10, 5, "sftp://host/b.csv", None, RunStatus::Failed, Some("boom"), now)
            .await
            .unwrap();

        let acquired = store.acquired_inbound_locations(10, 5).await.unwrap();
        assert_eq!(acquired, vec!["s3a://x/a.csv".to_string()]);
    }
}
