//! Blocking worker pool for codec work
//!
//! Decoding, transforming and encoding are CPU-bound. They run on tokio's
//! blocking threads, with a semaphore bounding how many run at once so a
//! burst of lookups cannot starve the rest of the blocking pool.

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{ArtworkError, Result};

#[derive(Debug, Clone)]
pub struct TransformPool {
    permits: Arc<Semaphore>,
}

impl TransformPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run `job` on a blocking thread once a permit is available.
    pub async fn run<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ArtworkError::Task(e.to_string()))?;

        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| ArtworkError::Task(e.to_string()))?
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
