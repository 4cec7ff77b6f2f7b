//! Supervisor - 長寿命ループの再起動ガード
//!
//! A loop future never completes normally: its output is
//! `Result<Infallible, QueueError>`, so finishing at all means it failed.
//! Both an `Err` and a panic are caught here, logged, and followed by a fixed
//! pause and a fresh call to the factory. There is no restart ceiling and the
//! pause never grows.

use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;

use crate::domain::Topic;
use crate::error::QueueError;
use crate::panic::panic_message;

pub async fn supervise<F, Fut>(
    name: &'static str,
    topic: Topic,
    pause: Duration,
    mut factory: F,
) -> Infallible
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Infallible, QueueError>>,
{
    let mut restarts: u64 = 0;
    loop {
        let reason = match AssertUnwindSafe(factory()).catch_unwind().await {
            Ok(Ok(never)) => match never {},
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        restarts += 1;
        tracing::error!(
            loop_name = name,
            %topic,
            error = %reason,
            restarts,
            pause_secs = pause.as_secs(),
            "queue loop crashed; restarting"
        );
        tokio::time::sleep(pause).await;
    }
}
