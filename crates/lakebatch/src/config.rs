//! `RunConfig` assembly: environment variables plus CLI-flag overrides,
//! resolved once at process start so a malformed configuration is a startup
//! error rather than a per-dataset one.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use lakebatch_catalog::{CatalogBackend, CatalogConfig};
use lakebatch_extract::context::ObjectStoreCredentials;

/// Everything a `Run(processId)` invocation needs, assembled once from
/// environment variables (with CLI flags taking precedence for the three the
/// CLI surface exposes: `env`, `max_threads`, `-v`).
pub struct RunConfig {
    pub process_id: i64,
    pub env: String,
    pub max_threads: usize,
    pub verbose: bool,
    pub catalog: CatalogConfig,
    pub object_store_credentials: ObjectStoreCredentials,
    /// Directory of JDBC driver archives. The `database` extractor talks to
    /// sources directly through `sqlx`, so this has no effect today; it is kept
    /// as a pass-through so a deployment's environment doesn't need to change
    /// if a JVM-backed driver is ever added for a source `sqlx` can't reach.
    pub jdbc_jars: Option<PathBuf>,
    pub lakehouse_framework_home: PathBuf,
}

impl RunConfig {
    /// Resolve from the process environment, with `cli_env`/`cli_max_threads`
    /// overriding the `env`/`max_threads` environment variables when present, and
    /// `process_id` coming only from the CLI (`--process-id`, env-backed by
    /// `PROCESS_ID` for scripting convenience at the clap layer).
    pub fn resolve(process_id: i64, cli_env: Option<String>, cli_max_threads: Option<usize>, verbose: bool) -> Result<Self> {
        let env = cli_env.or_else(|| env::var("env").ok()).unwrap_or_else(|| "default".to_string());

        let max_threads = resolve_max_threads(cli_max_threads, env::var("max_threads").ok().as_deref())?;

        let catalog = catalog_config()?;

        let object_store_credentials = ObjectStoreCredentials {
            aws_key: require_env("aws_key")?,
            aws_secret: require_env("aws_secret")?,
            aws_endpoint: require_env("aws_endpoint")?,
        };

        let jdbc_jars = env::var("jdbc_jars").ok().map(PathBuf::from);
        let lakehouse_framework_home = PathBuf::from(require_env("lakehouse_framework_home")?);

        Ok(Self {
            process_id,
            env,
            max_threads,
            verbose,
            catalog,
            object_store_credentials,
            jdbc_jars,
            lakehouse_framework_home,
        })
    }
}

/// `database_url`, if set, wins outright; otherwise fall back to the decomposed
/// `db_*` set (`db_type`, `db_host`, `db_port`, `db_user`, `db_password`, `db_name`).
fn catalog_config() -> Result<CatalogConfig> {
    if let Ok(url) = env::var("database_url") {
        return CatalogConfig::from_url(url).context("database_url is not a recognized connection string");
    }

    let backend = match require_env("db_type")?.to_ascii_lowercase().as_str() {
        "sqlite" => CatalogBackend::Sqlite,
        "postgres" | "postgresql" => CatalogBackend::Postgres,
        other => bail!("unrecognized db_type '{other}' (expected sqlite or postgres)"),
    };
    let host = require_env("db_host")?;
    let port = env::var("db_port").ok().map(|p| p.parse()).transpose().context("db_port is not a valid port number")?;
    let user = require_env("db_user")?;
    let password = require_env("db_password")?;
    let database = require_env("db_name")?;

    Ok(CatalogConfig::from_parts(backend, &host, port, &user, &password, &database))
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required environment variable '{name}'"))
}

/// `--max-threads` wins over `max_threads` when both are present; zero and
/// unset are both startup errors rather than a silently unbounded/idle pool.
fn resolve_max_threads(cli: Option<usize>, env_val: Option<&str>) -> Result<usize> {
    match cli.or_else(|| env_val.and_then(|v| v.parse().ok())) {
        Some(n) if n > 0 => Ok(n),
        Some(_) => bail!("max_threads must be greater than zero"),
        None => bail!("max_threads is not set (pass --max-threads or set max_threads)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_overrides_env_var() {
        assert_eq!(resolve_max_threads(Some(4), Some("8")).unwrap(), 4);
    }

    #[test]
    fn falls_back_to_env_var_when_no_flag() {
        assert_eq!(resolve_max_threads(None, Some("8")).unwrap(), 8);
    }

    #[test]
    fn zero_is_rejected() {
        assert!(resolve_max_threads(Some(0), None).is_err());
    }

    #[test]
    fn missing_both_is_an_error() {
        assert!(resolve_max_threads(None, None).is_err());
    }
}
