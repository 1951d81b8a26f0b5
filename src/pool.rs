//! Bounded worker pool
//!
//! A fixed number of workers drain one shared, unordered set of work items.
//! Each worker takes an item, runs it through [`run_with_retries`], and goes
//! back for the next one until the set is empty. The order in which items are
//! processed is unspecified; callers must not depend on it.
//!
//! If any item exhausts its retries the whole run fails: remaining workers are
//! dropped (cancelling their in-flight attempts) and the error is returned.

use crate::config::PoolConfig;
use crate::error::Result;
use crate::retry::run_with_retries;
use futures::future::try_join_all;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed-concurrency retrying task runner
#[derive(Clone, Debug)]
pub struct WorkerPool {
    concurrency: usize,
    max_retries: u32,
}

impl WorkerPool {
    /// Create a pool with `concurrency` workers and `max_retries` retries per item
    ///
    /// A concurrency of zero is raised to one.
    pub fn new(concurrency: usize, max_retries: u32) -> Self {
        Self {
            concurrency: concurrency.max(1),
            max_retries,
        }
    }

    /// Create a pool from configuration
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.concurrency, config.max_retries)
    }

    /// Number of concurrent workers
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Retries allowed per item after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Process every item with `worker`, returning all outputs in unspecified order
    ///
    /// Items are cloned for each attempt so a failed attempt can be retried with
    /// the same input.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RetriesExhausted`] for the first item that fails
    /// every attempt, or [`crate::Error::Cancelled`] once `cancel` fires.
    pub async fn run<T, R, F, Fut>(
        &self,
        items: impl IntoIterator<Item = T>,
        cancel: &CancellationToken,
        worker: F,
    ) -> Result<Vec<R>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let work: Mutex<VecDeque<T>> = Mutex::new(items.into_iter().collect());
        let total = work.lock().map(|w| w.len()).unwrap_or_default();

        debug!(
            items = total,
            concurrency = self.concurrency,
            max_retries = self.max_retries,
            "starting worker pool"
        );

        let workers =
            (0..self.concurrency).map(|worker_id| self.drain(worker_id, &work, cancel, &worker));
        let outputs = try_join_all(workers).await?;

        let results: Vec<R> = outputs.into_iter().flatten().collect();
        debug!(completed = results.len(), "worker pool finished");
        Ok(results)
    }

    /// One worker: take items until the shared set is empty
    async fn drain<T, R, F, Fut>(
        &self,
        worker_id: usize,
        work: &Mutex<VecDeque<T>>,
        cancel: &CancellationToken,
        worker: &F,
    ) -> Result<Vec<R>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let mut outputs = Vec::new();

        while let Some(item) = take(work) {
            let output = run_with_retries(self.max_retries, cancel, || worker(item.clone())).await?;
            outputs.push(output);
        }

        if !outputs.is_empty() {
            debug!(worker_id, processed = outputs.len(), "worker drained");
        }
        Ok(outputs)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}

fn take<T>(work: &Mutex<VecDeque<T>>) -> Option<T> {
    match work.lock() {
        Ok(mut guard) => guard.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}
