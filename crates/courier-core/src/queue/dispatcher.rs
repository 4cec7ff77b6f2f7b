//! Dispatcher - ready list を消費して handler を呼ぶ
//!
//! # 設計原則
//! - blocking pop が唯一の待機ポイント
//! - handler の Err も panic もここで捕まえ、delay set 経由で再投入する
//! - 再投入に失敗した場合は ready list の先頭に戻してからエラーを返す
//!   （supervisor が再起動する）

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::Queue;
use crate::domain::Topic;
use crate::error::QueueError;
use crate::handler::MessageHandler;
use crate::panic::panic_message;

/// Outcome of one dispatcher iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// Handler failed; the message went back to the delay set.
    Retried { error: String },
}

impl Queue {
    /// Pop one message (waiting as long as it takes) and hand it to `handler`.
    pub async fn dispatch_once(
        &self,
        topic: &Topic,
        handler: &dyn MessageHandler,
    ) -> Result<Dispatch, QueueError> {
        let message = self
            .store()
            .list_blocking_pop(&self.ready_key(topic))
            .await?;

        let outcome = AssertUnwindSafe(handler.handle(topic, &message))
            .catch_unwind()
            .await;
        let error = match outcome {
            Ok(Ok(())) => return Ok(Dispatch::Handled),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("handler panicked: {}", panic_message(payload.as_ref())),
        };

        tracing::error!(%topic, %message, %error, "message handling failed; re-queueing");

        let retry_wait = self.config().retry_wait_seconds;
        if let Err(err) = self.publish_delayed(topic, message.as_str(), retry_wait).await {
            tracing::error!(%topic, %message, error = %err, "failed to re-queue message");
            let ready_key = self.ready_key(topic);
            if let Err(restore) = self.store().list_push_front(&ready_key, &message).await {
                // 以後この message は log にしか残らない
                tracing::error!(
                    %topic,
                    %message,
                    error = %restore,
                    "failed to return message to the ready list"
                );
            }
            return Err(err);
        }

        Ok(Dispatch::Retried { error })
    }

    pub(crate) async fn run_dispatcher(
        &self,
        topic: &Topic,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Infallible, QueueError> {
        loop {
            self.dispatch_once(topic, handler.as_ref()).await?;
        }
    }
}
