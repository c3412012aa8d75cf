use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-size admission pool: at most `concurrency` tasks run at once.
pub struct AdmissionPool {
    semaphore: Arc<Semaphore>,
    completed: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Held by a running task. Leaves the in-flight gauge before the permit is
/// released, so the gauge never exceeds the pool size.
struct Admission {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Admission {
    fn enter(permit: OwnedSemaphorePermit, in_flight: Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { _permit: permit, in_flight }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdmissionPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            completed: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `task_fn` over every task, each on its own tokio task, admitting a
    /// new one only when a permit is free.
    ///
    /// Results come back in completion order, paired with their input. A task
    /// that panicked yields `None` and bumps the error counter.
    pub async fn execute<T, F, Fut>(
        &self,
        tasks: Vec<T>,
        task_fn: F,
    ) -> Vec<(T, Option<Fut::Output>)>
    where
        T: Clone + Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + 'static,
        Fut: std::future::Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let mut futures = FuturesUnordered::new();
        let mut results = Vec::with_capacity(tasks.len());

        for task in tasks {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    results.push((task, None));
                    continue;
                }
            };
            let admission = Admission::enter(permit, self.in_flight.clone(), &self.peak);
            let task_fn = task_fn.clone();
            let completed = self.completed.clone();
            let key = task.clone();

            let handle = tokio::spawn(async move {
                let _admission = admission;
                let result = task_fn(task).await;
                completed.fetch_add(1, Ordering::Relaxed);
                result
            });
            futures.push(async move { (key, handle.await) });
        }

        while let Some((key, joined)) = futures.next().await {
            match joined {
                Ok(output) => results.push((key, Some(output))),
                Err(e) => {
                    tracing::error!(error = %e, "pooled task did not complete");
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    results.push((key, None));
                }
            }
        }

        results
    }

    /// (completed, errors)
    pub fn get_stats(&self) -> (usize, usize) {
        (
            self.completed.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks that were running at the same moment.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
