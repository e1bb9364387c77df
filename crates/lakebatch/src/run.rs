//! Top-level control flow: `Run(processId)` sequences Bronze → Silver → Gold,
//! concurrent within a layer via the Stage Coordinator, sequential between layers.

use chrono::Utc;

use lakebatch_catalog::{AcquisitionDetail, CatalogStore, DatasetMaster};
use lakebatch_engine::{bronze, gold, silver, stage_coordinator, Result};
use lakebatch_extract::context::ExtractionContext;

const BRONZE_LAYER: &str = "BRONZE";
const SILVER_LAYER: &str = "SILVER";
const GOLD_LAYER: &str = "GOLD";

/// Execute `Run(processId)` to completion: Bronze, then Silver, then Gold. Each
/// layer runs its datasets concurrently (bounded by `max_workers`) and the next
/// layer only starts once every dataset in the current one has finished — a
/// dataset failing does not stop its siblings mid-layer, only the advance to the
/// next layer.
pub async fn run(store: &CatalogStore, ctx: &ExtractionContext, process_id: i64, max_workers: usize) -> Result<()> {
    run_bronze(store, ctx, process_id, max_workers).await?;
    run_silver(store, process_id, max_workers).await?;
    run_gold(store, process_id, max_workers).await
}

async fn run_bronze(store: &CatalogStore, ctx: &ExtractionContext, process_id: i64, max_workers: usize) -> Result<()> {
    let details = store.acquisition_details(process_id).await?;
    let today = Utc::now().date_naive();

    let store = store.clone();
    let ctx = ctx.clone();
    stage_coordinator::run_layer(&details, max_workers, move |detail: AcquisitionDetail| {
        let store = store.clone();
        let ctx = ctx.clone();
        async move { run_bronze_dataset(&store, &ctx, process_id, &detail, today).await }
    })
    .await
}

async fn run_bronze_dataset(
    store: &CatalogStore,
    ctx: &ExtractionContext,
    process_id: i64,
    detail: &AcquisitionDetail,
    today: chrono::NaiveDate,
) -> Result<()> {
    let column_metadata = store.column_metadata(detail.pre_ingestion_dataset_id).await?;
    let connection = store
        .acquisition_connection(&detail.outbound_source_platform, detail.outbound_source_system.as_deref().unwrap_or_default())
        .await?;

    bronze::run_b1(store, ctx, process_id, detail, &connection, &column_metadata, today).await?;

    let dataset = store.dataset(process_id, detail.pre_ingestion_dataset_id, BRONZE_LAYER).await?;
    bronze::run_b2(store, ctx, process_id, &dataset, detail, today).await?;
    Ok(())
}

async fn run_silver(store: &CatalogStore, process_id: i64, max_workers: usize) -> Result<()> {
    let datasets = store.datasets_for_layer(process_id, SILVER_LAYER).await?;
    let today = Utc::now().date_naive();

    let store = store.clone();
    stage_coordinator::run_layer(&datasets, max_workers, move |dataset: DatasetMaster| {
        let store = store.clone();
        async move { run_silver_dataset(&store, process_id, &dataset, today).await }
    })
    .await
}

/// Drive one silver dataset through every batch it owes standardization for, then
/// every batch it owes only a quality gate for — the latter is the crash-recovery
/// path `CatalogStore::unprocessed_for_dqm` exists for.
async fn run_silver_dataset(store: &CatalogStore, process_id: i64, dataset: &DatasetMaster, today: chrono::NaiveDate) -> Result<()> {
    for batch_id in store.unprocessed_for_standardization(process_id, dataset.dataset_id).await? {
        silver::run_silver_for_batch(store, process_id, dataset, batch_id, today).await?;
    }
    for batch_id in store.unprocessed_for_dqm(process_id, dataset.dataset_id).await? {
        silver::run_dqm_for_batch(store, process_id, dataset, batch_id, today).await?;
    }
    Ok(())
}

async fn run_gold(store: &CatalogStore, process_id: i64, max_workers: usize) -> Result<()> {
    let datasets = store.datasets_for_layer(process_id, GOLD_LAYER).await?;
    let today = Utc::now().date_naive();

    let store = store.clone();
    stage_coordinator::run_layer(&datasets, max_workers, move |dataset: DatasetMaster| {
        let store = store.clone();
        async move { run_gold_dataset(&store, process_id, &dataset, today).await }
    })
    .await
}

async fn run_gold_dataset(store: &CatalogStore, process_id: i64, dataset: &DatasetMaster, today: chrono::NaiveDate) -> Result<()> {
    for batch_id in store.unprocessed_for_transformation(process_id, dataset.dataset_id).await? {
        let now_ts = Utc::now().naive_utc().to_string();
        gold::run_gold_for_batch(store, process_id, dataset, batch_id, today, &now_ts).await?;
    }
    Ok(())
}
