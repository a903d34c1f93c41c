//! Sequential rate-limited batch caller.
//!
//! The Emissary corrupts its state when configuration calls overlap, so
//! batches of remote calls run strictly one after another: item i+1 starts
//! only after item i has settled. The first failure stops the batch and is
//! returned; later items never start.

use std::future::Future;
use std::time::Duration;

use crate::errors::AppError;

/// Ordered, one-at-a-time executor for per-item async actions.
#[derive(Debug, Clone, Default)]
pub struct SequentialBatch {
    delay: Option<Duration>,
}

impl SequentialBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between consecutive items.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Run `action` for every item in order, collecting the results.
    pub async fn run<I, T, F, Fut>(&self, items: I, mut action: F) -> Result<Vec<T>, AppError>
    where
        I: IntoIterator,
        F: FnMut(usize, I::Item) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut results = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
            }

            match action(index, item).await {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::debug!(index, error = %e, "Sequential batch stopped");
                    return Err(e);
                }
            }
        }

        Ok(results)
    }
}

/// Run a batch with no inter-item delay.
pub async fn run_sequentially<I, T, F, Fut>(items: I, action: F) -> Result<Vec<T>, AppError>
where
    I: IntoIterator,
    F: FnMut(usize, I::Item) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    SequentialBatch::new().run(items, action).await
}
