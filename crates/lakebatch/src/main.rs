//! `lakebatch` — entry point for `Run(processId)`: Bronze → Silver → Gold.

mod cli;
mod config;
mod run;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Command};
use config::RunConfig;
use lakebatch_catalog::CatalogStore;
use lakebatch_extract::context::ExtractionContext;
use lakebatch_logging::LogConfig;

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let Command::Run { process_id, env, max_threads, verbose } = cli.command;

    let config = match RunConfig::resolve(process_id, env, max_threads, verbose) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("lakebatch: configuration error: {err:#}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = lakebatch_logging::init_logging(LogConfig {
        home: config.lakehouse_framework_home.clone(),
        process_id: config.process_id,
        verbose: config.verbose,
    }) {
        eprintln!("lakebatch: failed to initialize logging: {err:#}");
        return ExitCode::from(2);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.max_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to build tokio runtime");
            return ExitCode::from(2);
        }
    };

    runtime.block_on(run_process(config))
}

async fn run_process(config: RunConfig) -> ExitCode {
    let store = match CatalogStore::open(&config.catalog).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "failed to open catalog store");
            return ExitCode::from(2);
        }
    };

    let ctx = ExtractionContext::new(config.env.clone(), config.object_store_credentials.clone());

    tracing::info!(process_id = config.process_id, env = %config.env, max_threads = config.max_threads, "starting run");

    match run::run(&store, &ctx, config.process_id, config.max_threads).await {
        Ok(()) => {
            tracing::info!(process_id = config.process_id, "run succeeded");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(process_id = config.process_id, error = %err, "run failed");
            ExitCode::from(1)
        }
    }
}
