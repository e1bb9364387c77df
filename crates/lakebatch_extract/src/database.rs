//! Database (JDBC-equivalent) acquisition.
//!
//! Synthesizes a connection URL from the stored JSON config, runs the configured
//! query, and writes one delimited text object to the inbound zone per run.

use std::collections::BTreeMap;

use serde_json::Value;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Column, Row};

use crate::error::{ExtractError, Result};

const PATH_STYLE_DRIVERS: &[&str] = &["mysql", "postgresql", "mariadb"];

/// Build the connection URL the upstream JDBC URL-synthesis logic describes:
/// path-append `database` for MySQL/PostgreSQL/MariaDB-style drivers, then append
/// every remaining config key (besides the reserved ones) as a query parameter, in
/// the JSON object's own key order.
pub fn synthesize_connection_url(config: &Value) -> Result<String> {
    let object = config
        .as_object()
        .ok_or_else(|| ExtractError::InvalidConfig("connection_config must be a JSON object".into()))?;

    let base_url = object
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::InvalidConfig("connection_config missing 'url'".into()))?;
    let driver = object
        .get("driver")
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::InvalidConfig("connection_config missing 'driver'".into()))?;

    let mut url = base_url.to_string();
    if let Some(db) = object.get("database").and_then(Value::as_str) {
        if PATH_STYLE_DRIVERS.iter().any(|d| driver.contains(d)) && !url.trim_end_matches('/').ends_with(&format!("/{db}")) {
            url = format!("{}/{db}", url.trim_end_matches('/'));
        }
    }

    const RESERVED: &[&str] = &["url", "user", "password", "driver", "jar", "database"];
    let params: Vec<String> = object
        .iter()
        .filter(|(key, _)| !RESERVED.contains(&key.as_str()))
        .map(|(key, value)| format!("{key}={}", value_to_query_param(value)))
        .collect();

    if !params.is_empty() {
        let sep = if url.contains('?') { "&" } else { "?" };
        url.push_str(sep);
        url.push_str(&params.join("&"));
    }
    Ok(url)
}

fn value_to_query_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single extracted row, column name to text representation, matching how the
/// upstream cursor results are loaded into a frame before being written out as CSV.
pub type ExtractedRow = BTreeMap<String, String>;

pub async fn extract_rows(config: &Value, query: &str) -> Result<Vec<ExtractedRow>> {
    let driver = config
        .get("driver")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let url = synthesize_connection_url(config)?;

    if driver.contains("postgresql") {
        let pool = PgPoolOptions::new().max_connections(1).connect(&url).await?;
        let rows = sqlx::query(query).fetch_all(&pool).await?;
        Ok(rows.iter().map(row_to_map_pg).collect())
    } else {
        let pool = MySqlPoolOptions::new().max_connections(1).connect(&url).await?;
        let rows = sqlx::query(query).fetch_all(&pool).await?;
        Ok(rows.iter().map(row_to_map_mysql).collect())
    }
}

fn row_to_map_pg(row: &sqlx::postgres::PgRow) -> ExtractedRow {
    row.columns()
        .iter()
        .map(|c| {
            let value: Option<String> = row.try_get(c.ordinal()).unwrap_or(None);
            (c.name().to_string(), value.unwrap_or_default())
        })
        .collect()
}

fn row_to_map_mysql(row: &sqlx::mysql::MySqlRow) -> ExtractedRow {
    row.columns()
        .iter()
        .map(|c| {
            let value: Option<String> = row.try_get(c.ordinal()).unwrap_or(None);
            (c.name().to_string(), value.unwrap_or_default())
        })
        .collect()
}

/// Render extracted rows as a single delimited text blob, column header first.
pub fn rows_to_delimited_text(rows: &[ExtractedRow], columns: &[String], delimiter: char) -> String {
    let mut out = String::new();
    out.push_str(&columns.join(&delimiter.to_string()));
    out.push('\n');
    for row in rows {
        let line: Vec<&str> = columns.iter().map(|c| row.get(c).map(String::as_str).unwrap_or("")).collect();
        out.push_str(&line.join(&delimiter.to_string()));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_database_to_path_for_mysql_style_drivers() {
        let config = json!({
            "driver": "com.mysql.cj.jdbc.Driver",
            "url": "jdbc:mysql://localhost:3306",
            "user": "u",
            "password": "p",
            "database": "sales",
        });
        let url = synthesize_connection_url(&config).unwrap();
        assert_eq!(url, "jdbc:mysql://localhost:3306/sales");
    }

    #[test]
    fn does_not_duplicate_database_already_present_in_url() {
        let config = json!({
            "driver": "com.mysql.cj.jdbc.Driver",
            "url": "jdbc:mysql://localhost:3306/sales",
            "user": "u",
            "password": "p",
            "database": "sales",
        });
        let url = synthesize_connection_url(&config).unwrap();
        assert_eq!(url, "jdbc:mysql://localhost:3306/sales");
    }

    #[test]
    fn non_path_style_driver_passes_url_through_with_extra_params() {
        let config = json!({
            "driver": "net.snowflake.client.jdbc.SnowflakeDriver",
            "url": "jdbc:snowflake://account.snowflakecomputing.com",
            "user": "u",
            "password": "p",
            "warehouse": "WH",
        });
        let url = synthesize_connection_url(&config).unwrap();
        assert_eq!(url, "jdbc:snowflake://account.snowflakecomputing.com?warehouse=WH");
    }

    #[test]
    fn rows_render_with_header_and_configured_delimiter() {
        let mut row = ExtractedRow::new();
        row.insert("id".to_string(), "1".to_string());
        row.insert("name".to_string(), "Alice".to_string());
        let text = rows_to_delimited_text(&[row], &["id".to_string(), "name".to_string()], ',');
        assert_eq!(text, "id,name\n1,Alice\n");
    }
}
