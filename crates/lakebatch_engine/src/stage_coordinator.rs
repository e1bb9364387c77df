//! Stage Coordinator: a bounded worker pool that runs one task per dataset
//! within a layer, then surfaces the first failure once every task has finished.
//!
//! Cancellation is never propagated between datasets: a failing dataset does not
//! stop its siblings mid-layer, it only stops the caller from advancing to the
//! next layer. Ordering within a single dataset (bronze→silver→gold) is the
//! caller's responsibility; this only bounds fan-out across datasets.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::error::{EngineError, Result};

/// Run `task` once per entry in `datasets`, at most `max_workers` concurrently,
/// and return the first error encountered (if any) after every task completes.
pub async fn run_layer<T, F, Fut>(datasets: &[T], max_workers: usize, task: F) -> Result<()>
where
    T: Clone + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if datasets.is_empty() {
        return Ok(());
    }

    let permits = max_workers.max(1).min(datasets.len());
    let semaphore = Arc::new(Semaphore::new(permits));
    let task = Arc::new(task);

    let handles = datasets.iter().cloned().map(|dataset| {
        let semaphore = Arc::clone(&semaphore);
        let task = Arc::clone(&task);
        tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            task(dataset).await
        })
    });

    let results = join_all(handles).await;

    let mut first_error = None;
    for result in results {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) if first_error.is_none() => first_error = Some(err),
            Ok(Err(_)) => {}
            Err(join_err) if first_error.is_none() => {
                first_error = Some(EngineError::Other(format!("task panicked: {join_err}")));
            }
            Err(_) => {}
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn runs_every_dataset_and_succeeds_when_all_succeed() {
        let datasets = vec![1i64, 2, 3, 4];
        let counter = Arc::new(AtomicUsize::new(0));

        let result = run_layer(&datasets, 2, {
            let counter = Arc::clone(&counter);
            move |_dataset: i64| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn surfaces_first_error_but_still_runs_every_task() {
        let datasets = vec![1i64, 2, 3];
        let counter = Arc::new(AtomicUsize::new(0));

        let result = run_layer(&datasets, 3, {
            let counter = Arc::clone(&counter);
            move |dataset: i64| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if dataset == 2 {
                        Err(EngineError::Other("boom".to_string()))
                    } else {
                        Ok(())
                    }
                }
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_dataset_list_is_a_no_op() {
        let datasets: Vec<i64> = Vec::new();
        let result = run_layer(&datasets, 4, |_: i64| async { Ok(()) }).await;
        assert!(result.is_ok());
    }
}
