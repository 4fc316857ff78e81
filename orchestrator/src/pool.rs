//! Fixed-size pool of OS threads for blocking scoring work.
//!
//! Jobs are queued on a shared channel and picked up by whichever worker is
//! free. Each job carries a [`CancelToken`]; the waiting side cancels it on
//! timeout so a queued job that has not started yet is skipped outright.

use crate::error::PoolError;
use inference::CancelToken;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueuedJob {
    token: CancelToken,
    run: Job,
}

pub struct WorkerPool {
    size: usize,
    queue: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `size` worker threads. `size` must be at least one.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<QueuedJob>();
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let pending = Arc::clone(&pending);
            let handle = thread::Builder::new()
                .name(format!("scoring-worker-{}", id))
                .spawn(move || worker_loop(id, receiver, pending));

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Dropping the sender lets already-started workers exit.
                    drop(sender);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        debug!(size, "worker pool started");

        Ok(Self {
            size,
            queue: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            pending,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs queued or running right now.
    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.queue).is_none()
    }

    /// Queue `work` and return a handle to await its result.
    pub fn submit<T, F>(&self, work: F) -> Result<JobHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        let token = CancelToken::new();
        let (sender, receiver) = oneshot::channel();

        let job_token = token.clone();
        let run: Job = Box::new(move || {
            let output = work(&job_token);
            // The waiter may have given up already.
            let _ = sender.send(output);
        });

        let queue = lock(&self.queue);
        let queue = queue.as_ref().ok_or(PoolError::Closed)?;

        self.pending.fetch_add(1, Ordering::AcqRel);
        if queue
            .send(QueuedJob {
                token: token.clone(),
                run,
            })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::Closed);
        }

        Ok(JobHandle { token, receiver })
    }

    /// Stop accepting new jobs. Workers drain what is already queued, then exit.
    pub fn close(&self) {
        if lock(&self.queue).take().is_some() {
            debug!("worker pool closed to new jobs");
        }
    }

    /// Close the queue and wait for every worker thread to finish.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        self.close();

        let workers: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        if workers.is_empty() {
            return Ok(());
        }

        let count = workers.len();
        let panicked = tokio::task::spawn_blocking(move || {
            workers
                .into_iter()
                .map(|worker| worker.join())
                .filter(|joined| joined.is_err())
                .count()
        })
        .await
        .map_err(|e| PoolError::Join(e.to_string()))?;

        if panicked > 0 {
            return Err(PoolError::Join(format!("{} of {} workers panicked", panicked, count)));
        }

        debug!(workers = count, "worker pool stopped");
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receiving side of a submitted job.
pub struct JobHandle<T> {
    token: CancelToken,
    receiver: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Wait up to `limit` for the job's result. On timeout the job's token is
    /// cancelled and the eventual result, if any, is discarded.
    pub async fn wait(self, limit: Duration) -> Result<T, PoolError> {
        match tokio::time::timeout(limit, self.receiver).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => Err(PoolError::WorkerLost),
            Err(_) => {
                self.token.cancel();
                Err(PoolError::Timeout(limit))
            }
        }
    }
}

fn worker_loop(id: usize, receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>, pending: Arc<AtomicUsize>) {
    loop {
        // Hold the lock only while taking the next job.
        let next = lock(&receiver).recv();
        let job = match next {
            Ok(job) => job,
            Err(_) => break,
        };

        if job.token.is_cancelled() {
            debug!(worker = id, "skipping cancelled job");
            // Dropping the job drops its result sender; nobody is waiting.
        } else if panic::catch_unwind(AssertUnwindSafe(job.run)).is_err() {
            error!(worker = id, "scoring job panicked");
        }

        pending.fetch_sub(1, Ordering::AcqRel);
    }

    debug!(worker = id, "worker exiting");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("recovering poisoned worker pool lock");
        PoisonError::into_inner(poisoned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    #[tokio::test]
    async fn test_runs_jobs() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit(|_| 21 * 2).unwrap();
        assert_eq!(handle.wait(Duration::from_secs(5)).await.unwrap(), 42);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_size_becomes_one() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_cancels_token() {
        let pool = WorkerPool::new(1).unwrap();
        let handle = pool
            .submit(|_| thread::sleep(Duration::from_millis(300)))
            .unwrap();
        let token = handle.token().clone();

        let started = Instant::now();
        let result = handle.wait(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(PoolError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(token.is_cancelled());

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_job_is_skipped() {
        let pool = WorkerPool::new(1).unwrap();
        let ran = Arc::new(AtomicBool::new(false));

        // Occupy the only worker so the second job stays queued.
        let blocker = pool
            .submit(|_| thread::sleep(Duration::from_millis(100)))
            .unwrap();

        let flag = Arc::clone(&ran);
        let queued = pool.submit(move |_| flag.store(true, Ordering::SeqCst)).unwrap();
        let result = queued.wait(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(PoolError::Timeout(_))));

        blocker.wait(Duration::from_secs(5)).await.unwrap();
        pool.shutdown().await.unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(pool.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn test_worker_survives_panic() {
        let pool = WorkerPool::new(1).unwrap();

        let failed = pool.submit(|_| -> u32 { panic!("scoring blew up") }).unwrap();
        assert!(matches!(
            failed.wait(Duration::from_secs(5)).await,
            Err(PoolError::WorkerLost)
        ));

        let ok = pool.submit(|_| 7u32).unwrap();
        assert_eq!(ok.wait(Duration::from_secs(5)).await.unwrap(), 7);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown().await.unwrap();

        assert!(pool.is_closed());
        assert!(matches!(pool.submit(|_| ()), Err(PoolError::Closed)));
        // A second shutdown is a no-op.
        pool.shutdown().await.unwrap();
    }
}
