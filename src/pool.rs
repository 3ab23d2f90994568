//! Bounded worker pool shared by the root builder and the validation harness.

use std::sync::Arc;

use futures::future::join_all;
use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Run `f` over every item on at most `workers` blocking threads at a time.
///
/// Results come back in submission order. A panic inside `f` surfaces as a
/// [`JoinError`] for that item only.
pub async fn map_bounded<T, R, F>(
    items: Vec<T>,
    workers: usize,
    f: Arc<F>,
    bar: &ProgressBar,
) -> Vec<Result<R, JoinError>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));

    let handles = items.into_iter().map(|item| {
        let semaphore = Arc::clone(&semaphore);
        let f = Arc::clone(&f);
        let bar = bar.clone();
        tokio::spawn(async move {
            // held until the blocking task returns
            let _permit = semaphore.acquire_owned().await;
            let result = tokio::task::spawn_blocking(move || f(item)).await;
            bar.inc(1);
            result
        })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.and_then(|inner| inner))
        .collect()
}
