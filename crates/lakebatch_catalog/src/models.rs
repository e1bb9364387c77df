//! Row types for every control-plane and log table.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// `status` column shared by every `log_*` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN-PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Layer a `dataset_master` row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

/// Criticality of a quality rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text")]
pub enum Criticality {
    C,
    #[sqlx(rename = "NC")]
    Nc,
}

/// `location` is a bronze dataset's landing path, a gold dataset's published
/// table path, and — for silver — the *standardized* snapshot path that
/// `run_standardization_for_batch` writes. `staging_location` is silver-only: the
/// distinct, post-quality-gate snapshot path that `run_dqm_for_batch` reads the
/// standardized frame from `location` and writes the gated result to, so the two
/// writes never collapse onto one versioned table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DatasetMaster {
    pub process_id: i64,
    pub dataset_id: i64,
    pub dataset_name: String,
    pub layer: String,
    pub location: String,
    pub file_pattern: Option<String>,
    pub file_pattern_static: String,
    pub delimiter: Option<String>,
    pub partition_columns: Option<String>,
    pub staging_location: Option<String>,
    pub staging_partition_columns: Option<String>,
    pub is_active: bool,
}

impl DatasetMaster {
    pub fn is_static_pattern(&self) -> bool {
        self.file_pattern_static == "Y"
    }

    pub fn partition_column_list(&self) -> Vec<String> {
        self.partition_columns
            .as_deref()
            .map(split_csv)
            .unwrap_or_default()
    }

    pub fn staging_partition_column_list(&self) -> Vec<String> {
        self.staging_partition_columns
            .as_deref()
            .map(split_csv)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ColumnMetadata {
    pub dataset_id: i64,
    pub column_name: String,
    pub source_column_name: Option<String>,
    pub column_type: String,
    pub date_format: Option<String>,
    pub column_json_mapping: Option<String>,
    pub column_order: i32,
    pub dashboard_flag: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AcquisitionConnectionMaster {
    pub connection_id: i64,
    pub platform: String,
    pub system: String,
    pub connection_config: String,
    pub ssh_private_key: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiConnectionDtl {
    pub connection_id: i64,
    pub seq_no: i32,
    pub step_type: String,
    pub method: Option<String>,
    pub url: Option<String>,
    pub token_url: Option<String>,
    pub auth_type: Option<String>,
    pub token_type: Option<String>,
    pub token_path: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub issuer: Option<String>,
    pub scope: Option<String>,
    pub private_key: Option<String>,
    pub headers: Option<String>,
    pub params: Option<String>,
    pub data: Option<String>,
    pub json_body: Option<String>,
    pub body_values: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AcquisitionDetail {
    pub process_id: i64,
    pub pre_ingestion_dataset_id: i64,
    pub outbound_source_platform: String,
    pub outbound_source_system: Option<String>,
    pub outbound_source_location: String,
    pub outbound_source_file_pattern: Option<String>,
    pub outbound_source_file_pattern_static: String,
    pub inbound_location: String,
    pub inbound_file_pattern: Option<String>,
    pub delimiter: Option<String>,
    pub query: Option<String>,
    pub columns: Option<String>,
}

impl AcquisitionDetail {
    pub fn is_static_pattern(&self) -> bool {
        self.outbound_source_file_pattern_static == "Y"
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StandardizationDtl {
    pub dataset_id: i64,
    pub column_name: String,
    pub seq_no: i32,
    pub function_name: String,
    pub parameters: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DqmMasterDtl {
    pub qc_id: i64,
    pub process_id: i64,
    pub dataset_id: i64,
    pub column_name: String,
    pub qc_type: String,
    pub parameters: Option<String>,
    pub criticality: String,
    pub threshold_pct: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TransformationDependencyMaster {
    pub process_id: i64,
    pub dataset_id: i64,
    pub dependent_dataset_id: i64,
    pub transformation_step: i32,
    pub transformation_type: String,
    pub staging_table: Option<String>,
    pub join_how: Option<String>,
    pub left_table_columns: Option<String>,
    pub right_table_columns: Option<String>,
    pub primary_keys: Option<String>,
    pub extra_values: Option<String>,
    pub custom_transformation_query: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogAcquisition {
    pub seq_no: i64,
    pub batch_id: i64,
    pub run_date: NaiveDate,
    pub process_id: i64,
    pub pre_ingestion_dataset_id: i64,
    pub outbound_source_location: String,
    pub inbound_file_location: Option<String>,
    pub status: String,
    pub exception_details: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogRawProcess {
    pub file_id: i64,
    pub batch_id: i64,
    pub run_date: NaiveDate,
    pub process_id: i64,
    pub dataset_id: i64,
    pub inbound_file_location: String,
    pub status: String,
    pub exception_details: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogStandardization {
    pub seq_no: i64,
    pub batch_id: i64,
    pub run_date: NaiveDate,
    pub process_id: i64,
    pub dataset_id: i64,
    pub status: String,
    pub exception_details: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogDqm {
    pub seq_no: i64,
    pub batch_id: i64,
    pub run_date: NaiveDate,
    pub process_id: i64,
    pub dataset_id: i64,
    pub qc_id: i64,
    pub qc_type: String,
    pub total_count: i64,
    pub error_count: i64,
    pub status: String,
    pub exception_details: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LogTransformation {
    pub seq_no: i64,
    pub batch_id: i64,
    pub run_date: NaiveDate,
    pub process_id: i64,
    pub dataset_id: i64,
    pub status: String,
    pub exception_details: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
}

pub(crate) fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
