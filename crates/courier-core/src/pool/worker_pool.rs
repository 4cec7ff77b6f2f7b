use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{PoolError, TaskResult};
use crate::panic::panic_message;

type Job<T> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, TaskResult<T>> + Send>;

struct PoolInner<T> {
    max_workers: usize,
    cancel: CancellationToken,
    intake: Mutex<Option<mpsc::Sender<Job<T>>>>,
    receiver: Arc<Mutex<mpsc::Receiver<Job<T>>>>,
    results: Arc<Mutex<Vec<TaskResult<T>>>>,
    outstanding: Arc<AtomicUsize>,
    started: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Fixed-size worker pool.
///
/// Clones share the same workers, intake and results.
///
/// # 使用例
/// ```ignore
/// let pool = WorkerPool::new(CancellationToken::new(), 3);
/// pool.run().await?;
/// for (i, row) in rows.into_iter().enumerate() {
///     pool.submit(move |_cancel| business_handle(row, Some(i), enrich)).await?;
/// }
/// let results = pool.close_and_wait().await;
/// ```
pub struct WorkerPool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for WorkerPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Bind a pool to `cancel`. Cancelling the parent token stops the pool;
    /// [`WorkerPool::cancel`] never touches the parent.
    pub fn new(cancel: CancellationToken, max_workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(PoolInner {
                max_workers: max_workers.max(1),
                cancel: cancel.child_token(),
                intake: Mutex::new(Some(tx)),
                receiver: Arc::new(Mutex::new(rx)),
                results: Arc::new(Mutex::new(Vec::new())),
                outstanding: Arc::new(AtomicUsize::new(0)),
                started: AtomicBool::new(false),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Spawn the workers. Must be called from inside a tokio runtime.
    pub async fn run(&self) -> Result<(), PoolError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(PoolError::AlreadyRunning);
        }

        let mut workers = self.inner.workers.lock().await;
        for worker_id in 0..self.inner.max_workers {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.inner.receiver),
                Arc::clone(&self.inner.results),
                Arc::clone(&self.inner.outstanding),
                self.inner.cancel.clone(),
            )));
        }
        tracing::debug!(workers = self.inner.max_workers, "pool started");
        Ok(())
    }

    /// Hand a task to the pool, waiting until a worker can take it.
    pub async fn submit<F, Fut>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult<T>> + Send + 'static,
    {
        if self.inner.cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }
        let sender = self
            .inner
            .intake
            .lock()
            .await
            .clone()
            .ok_or(PoolError::Closed)?;

        let job: Job<T> = Box::new(move |cancel| task(cancel).boxed());

        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        let accepted = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => Err(PoolError::Cancelled),
            sent = sender.send(job) => sent.map_err(|_| PoolError::Closed),
        };
        if accepted.is_err() {
            self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
        accepted
    }

    /// Stop taking work. Tasks already pulled by a worker run to completion.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// Submitted tasks whose result is not recorded yet.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Close the intake, wait for the workers to finish everything they can
    /// still take, and return the collected results.
    ///
    /// Results are stably sorted by `index` when any result carries one.
    /// Tasks left in the intake after a cancel are dropped without a result.
    pub async fn close_and_wait(&self) -> Vec<TaskResult<T>> {
        self.inner.intake.lock().await.take();

        let workers = std::mem::take(&mut *self.inner.workers.lock().await);
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "pool worker aborted");
            }
        }

        let mut receiver = self.inner.receiver.lock().await;
        receiver.close();
        let mut dropped = 0_usize;
        while receiver.try_recv().is_ok() {
            dropped += 1;
        }
        drop(receiver);
        if dropped > 0 {
            self.inner.outstanding.fetch_sub(dropped, Ordering::SeqCst);
            tracing::warn!(dropped, "pool closed with tasks that never ran");
        }

        let mut results = std::mem::take(&mut *self.inner.results.lock().await);
        if results.iter().any(|result| result.index.is_some()) {
            results.sort_by_key(|result| result.index);
        }
        results
    }
}

async fn worker_loop<T: Send + 'static>(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job<T>>>>,
    results: Arc<Mutex<Vec<TaskResult<T>>>>,
    outstanding: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = async { receiver.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        // submit 経由の task が生で panic しても worker は生き残る
        let result = match AssertUnwindSafe(job(cancel.clone())).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let error = panic_message(payload.as_ref());
                tracing::error!(worker_id, %error, "pool task panicked");
                TaskResult::fail(None, None, error)
            }
        };

        results.lock().await.push(result);
        outstanding.fetch_sub(1, Ordering::SeqCst);
    }
    tracing::debug!(worker_id, "pool worker stopped");
}
