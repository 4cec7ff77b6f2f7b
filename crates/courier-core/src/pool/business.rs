//! Business helpers - task 本体を結果レコードに包む
//!
//! `business_handle` は入力 `data` を受け取る処理を実行し、Err も panic も
//! `TaskStatus::Fail` の結果に変換する。失敗時も入力を返すので再実行に使える。

use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::{PoolError, TaskResult, TaskStatus, WorkerPool};
use crate::panic::panic_message;

/// Run `handle(data)` behind a panic boundary.
///
/// - `Ok(Some(v))`: success carrying `v`
/// - `Ok(None)`: success echoing `data`
/// - `Err(e)` or panic: fail with the error text, echoing `data`
pub async fn business_handle<T, F, Fut, E>(data: T, index: Option<usize>, handle: F) -> TaskResult<T>
where
    T: Clone,
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let input = data.clone();
    guarded(index, Some(data), async move { handle(input).await }).await
}

async fn guarded<T, Fut, E>(index: Option<usize>, echo: Option<T>, fut: Fut) -> TaskResult<T>
where
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let error = match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(Some(value))) => return TaskResult::success(index, value),
        Ok(Ok(None)) => {
            return TaskResult {
                index,
                data: echo,
                status: TaskStatus::Success,
                error: None,
            };
        }
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::error!(index = ?index, %error, "business task failed");
    TaskResult::fail(index, echo, error)
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Submit a plain closure; its output becomes the result data.
    ///
    /// Pass `Some(index)` for every task that should come back in order.
    pub async fn fast_submit<F, Fut, E>(
        &self,
        index: Option<usize>,
        handle: F,
    ) -> Result<(), PoolError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.submit(move |_cancel| {
            guarded(index, None, async move { handle().await.map(Some) })
        })
        .await
    }
}

/// Create a pool, let `f` submit into it, and collect the results.
pub async fn fast_pool<T, F, Fut>(max_workers: usize, f: F) -> Result<Vec<TaskResult<T>>, PoolError>
where
    T: Send + 'static,
    F: FnOnce(WorkerPool<T>) -> Fut,
    Fut: Future<Output = Result<(), PoolError>>,
{
    fast_pool_with_cancel(CancellationToken::new(), max_workers, f).await
}

/// [`fast_pool`] bound to a caller's cancellation token.
///
/// Cancellation while `f` is still submitting is not an error: whatever ran
/// is returned.
pub async fn fast_pool_with_cancel<T, F, Fut>(
    cancel: CancellationToken,
    max_workers: usize,
    f: F,
) -> Result<Vec<TaskResult<T>>, PoolError>
where
    T: Send + 'static,
    F: FnOnce(WorkerPool<T>) -> Fut,
    Fut: Future<Output = Result<(), PoolError>>,
{
    let pool = WorkerPool::new(cancel, max_workers);
    pool.run().await?;

    let submitted = f(pool.clone()).await;
    let results = pool.close_and_wait().await;
    match submitted {
        Ok(()) | Err(PoolError::Cancelled) => Ok(results),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerError;
    use rstest::rstest;

    #[tokio::test]
    async fn one_failing_task_out_of_ten() {
        let results = fast_pool(3, |pool| async move {
            for i in 0..10_usize {
                pool.fast_submit(Some(i), move || async move {
                    if i == 4 {
                        Err(HandlerError::failed("task 4 failed"))
                    } else {
                        Ok(i * 10)
                    }
                })
                .await?;
            }
            Ok::<(), PoolError>(())
        })
        .await
        .unwrap();

        assert_eq!(results.len(), 10);
        let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].index, Some(4));
        assert_eq!(failed[0].status, TaskStatus::Fail);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 9);
        assert!(results.iter().all(|r| r.data.is_some() || r.error.is_some()));
        assert_eq!(
            results.iter().map(|r| r.index).collect::<Vec<_>>(),
            (0..10).map(Some).collect::<Vec<_>>()
        );
    }

    #[rstest]
    #[case::replaced("in", Ok(Some("out")), TaskStatus::Success, "out", None)]
    #[case::echoed("in", Ok(None), TaskStatus::Success, "in", None)]
    #[case::failed("in", Err("bad row"), TaskStatus::Fail, "in", Some("bad row"))]
    #[tokio::test]
    async fn business_handle_outcomes(
        #[case] data: &'static str,
        #[case] outcome: Result<Option<&'static str>, &'static str>,
        #[case] status: TaskStatus,
        #[case] expected_data: &'static str,
        #[case] expected_error: Option<&'static str>,
    ) {
        let result = business_handle(data, Some(1), |_input| async move { outcome }).await;
        assert_eq!(result.index, Some(1));
        assert_eq!(result.status, status);
        assert_eq!(result.data, Some(expected_data));
        assert_eq!(result.error.as_deref(), expected_error);
    }

    #[tokio::test]
    async fn business_handle_recovers_panics() {
        let result = business_handle(7_u32, None, |n| async move {
            if n == 7 {
                panic!("unlucky {n}");
            }
            Ok::<Option<u32>, HandlerError>(None)
        })
        .await;

        assert_eq!(result.status, TaskStatus::Fail);
        assert_eq!(result.data, Some(7));
        assert_eq!(result.error.as_deref(), Some("unlucky 7"));
    }

    #[tokio::test]
    async fn pre_cancelled_token_yields_no_results() {
        let token = CancellationToken::new();
        token.cancel();

        let results = fast_pool_with_cancel(token, 2, |pool: WorkerPool<u32>| async move {
            pool.fast_submit(None, || async { Ok::<u32, HandlerError>(1) })
                .await
        })
        .await
        .unwrap();
        assert!(results.is_empty());
    }
}
