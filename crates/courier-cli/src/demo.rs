//! demo - 単一プロセスでの一通りの動作確認
//!
//! 1. method consumer を default topic で起動
//! 2. 即時 / 遅延 / 1 回失敗する method を publish
//! 3. 失敗分が retry で戻ってくるまで待つ
//! 4. worker pool で 10 件処理（#4 は失敗）

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tokio::sync::mpsc;

use courier_core::handler::HandlerError;
use courier_core::pool::fast_pool;
use courier_core::{ConsumerBuilder, PoolError, Queue};

pub async fn run(queue: Queue, max_workers: usize) -> anyhow::Result<()> {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<String>();
    let flaky_failures = Arc::new(AtomicU32::new(1));

    let consumer = ConsumerBuilder::new()
        .method_typed("Greet", {
            let done_tx = done_tx.clone();
            move |(name,): (String,)| {
                let done_tx = done_tx.clone();
                async move {
                    tracing::info!(%name, "hello");
                    done_tx
                        .send(format!("Greet({name})"))
                        .map_err(HandlerError::failed)
                }
            }
        })?
        .method_typed("Flaky", {
            let done_tx = done_tx.clone();
            move |(attempt_of,): (String,)| {
                let done_tx = done_tx.clone();
                let flaky_failures = flaky_failures.clone();
                async move {
                    let left = flaky_failures.load(Ordering::SeqCst);
                    if left > 0 {
                        flaky_failures.fetch_sub(1, Ordering::SeqCst);
                        return Err(HandlerError::failed(format!(
                            "intentional failure for {attempt_of} (left={left})"
                        )));
                    }
                    done_tx
                        .send(format!("Flaky({attempt_of})"))
                        .map_err(HandlerError::failed)
                }
            }
        })?
        .expect_methods(&["Greet", "Flaky"])
        .build()?;
    let handle = consumer.start_on_default_topic(&queue);

    queue.publish_method("Greet", vec![json!("now")]).await?;
    queue
        .publish_method_delayed("Greet", vec![json!("in two seconds")], 2)
        .await?;
    queue.publish_method("Flaky", vec![json!("retry demo")]).await?;

    let retry_window = queue.config().retry_wait_seconds + queue.config().empty_rest_interval + 5;
    for _ in 0..3 {
        let done = tokio::time::timeout(Duration::from_secs(retry_window), done_rx.recv())
            .await
            .context("timed out waiting for queued methods")?
            .context("consumer stopped")?;
        println!("handled: {done}");
    }
    handle.abort();

    let counts = queue.counts(&queue.default_topic()).await?;
    println!("queue after demo: {}", serde_json::to_string(&counts)?);

    let results = fast_pool(max_workers, |pool| async move {
        for i in 0..10_usize {
            pool.fast_submit(Some(i), move || async move {
                if i == 4 {
                    Err(HandlerError::failed(format!("task {i} failed")))
                } else {
                    Ok(json!({ "row": i, "square": i * i }))
                }
            })
            .await?;
        }
        Ok::<(), PoolError>(())
    })
    .await?;
    println!("pool results:\n{}", serde_json::to_string_pretty(&results)?);

    Ok(())
}
