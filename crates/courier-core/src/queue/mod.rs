//! Queue - topic ごとの ready list / delay set を扱うクライアント
//!
//! # 主要コンポーネント
//! - **publish / publish_delayed**: ready list / delay set への投入
//! - **promoter**: 期限の来た delay entry を ready list へ移す
//! - **dispatcher**: ready list を blocking pop して handler を呼ぶ
//! - **supervisor**: 上の 2 ループを落ちても再起動し続ける
//!
//! Delivery is at-least-once. A message is either still in the store or has
//! been re-queued before any failure path returns, so handlers must be
//! idempotent.

mod dispatcher;
mod promoter;
pub mod supervisor;

pub use self::dispatcher::Dispatch;
pub use self::promoter::PromoteStep;

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::QueueConfig;
use crate::domain::{DelayedMember, Message, MethodCall, Topic};
use crate::error::QueueError;
use crate::handler::MessageHandler;
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator, Store, SystemClock, UlidGenerator};

use self::supervisor::supervise;

struct QueueInner {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: QueueConfig,
}

/// Queue client. Cheap to clone; clones share the store and config.
///
/// # 使用例
/// ```ignore
/// let queue = Queue::new(Arc::new(InMemoryStore::new()), QueueConfig::default());
/// queue.publish(&Topic::new("orders"), Message::json(&order)?).await?;
/// let consumer = queue.start_consuming(Topic::new("orders"), Arc::new(registry));
/// ```
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    pub fn new(store: Arc<dyn Store>, config: QueueConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Store>, config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        Self {
            inner: Arc::new(QueueInner {
                store,
                clock,
                ids,
                config,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    fn ready_key(&self, topic: &Topic) -> String {
        topic.ready_key(&self.inner.config.key_prefix)
    }

    fn delay_key(&self, topic: &Topic) -> String {
        topic.delay_key(&self.inner.config.key_prefix)
    }

    /// Append to the tail of the topic's ready list.
    ///
    /// Returns whether the list is non-empty afterwards.
    pub async fn publish(
        &self,
        topic: &Topic,
        message: impl Into<Message>,
    ) -> Result<bool, QueueError> {
        let message = message.into();
        let len = self
            .inner
            .store
            .list_push(&self.ready_key(topic), message.as_str())
            .await?;
        Ok(len > 0)
    }

    /// Insert into the topic's delay set with score `now + delay_seconds`
    /// (whole unix seconds).
    pub async fn publish_delayed(
        &self,
        topic: &Topic,
        message: impl Into<Message>,
        delay_seconds: u64,
    ) -> Result<bool, QueueError> {
        let message = message.into();
        let ready_at = self
            .inner
            .clock
            .now()
            .timestamp()
            .saturating_add(i64::try_from(delay_seconds).unwrap_or(i64::MAX));
        let member = if self.inner.config.tag_delayed_members {
            DelayedMember::tagged(self.inner.ids.generate(), message)
        } else {
            DelayedMember::untagged(message)
        };
        self.inner
            .store
            .sorted_set_insert(&self.delay_key(topic), &member.encode(), ready_at as f64)
            .await?;
        Ok(true)
    }

    /// Publish a `{Method, Params}` envelope to the default topic.
    pub async fn publish_method(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<bool, QueueError> {
        let message = MethodCall::new(method, params).to_message()?;
        self.publish(&self.default_topic(), message).await
    }

    pub async fn publish_method_delayed(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
        delay_seconds: u64,
    ) -> Result<bool, QueueError> {
        let message = MethodCall::new(method, params).to_message()?;
        self.publish_delayed(&self.default_topic(), message, delay_seconds)
            .await
    }

    pub fn default_topic(&self) -> Topic {
        Topic::new(self.inner.config.default_topic.clone())
    }

    pub async fn counts(&self, topic: &Topic) -> Result<QueueCounts, QueueError> {
        let ready = self.inner.store.list_len(&self.ready_key(topic)).await?;
        let delayed = self
            .inner
            .store
            .sorted_set_len(&self.delay_key(topic))
            .await?;
        Ok(QueueCounts { ready, delayed })
    }

    /// Start the supervised promoter and dispatcher for `topic` on the
    /// current tokio runtime.
    ///
    /// Run at most one consumer per topic per store; a second one only
    /// duplicates work.
    pub fn start_consuming(
        &self,
        topic: Topic,
        handler: Arc<dyn MessageHandler>,
    ) -> ConsumerHandle {
        let promoter = self.start_delay_promoter(topic.clone());

        let queue = self.clone();
        let dispatcher = tokio::spawn(supervise(
            "dispatcher",
            topic.clone(),
            self.inner.config.auto_boot_time(),
            {
                let topic = topic.clone();
                move || {
                    let queue = queue.clone();
                    let topic = topic.clone();
                    let handler = handler.clone();
                    async move { queue.run_dispatcher(&topic, handler).await }
                }
            },
        ));

        tracing::info!(%topic, "consumer started");
        ConsumerHandle {
            topic,
            promoter,
            dispatcher,
        }
    }

    /// Supervised promoter only.
    pub fn start_delay_promoter(&self, topic: Topic) -> JoinHandle<Infallible> {
        let queue = self.clone();
        tokio::spawn(supervise(
            "promoter",
            topic.clone(),
            self.inner.config.auto_boot_time(),
            move || {
                let queue = queue.clone();
                let topic = topic.clone();
                async move { queue.run_promoter(&topic).await }
            },
        ))
    }
}

/// Running promoter + dispatcher of one topic.
///
/// Dropping the handle detaches the loops; they keep running for the life of
/// the runtime.
pub struct ConsumerHandle {
    topic: Topic,
    promoter: JoinHandle<Infallible>,
    dispatcher: JoinHandle<Infallible>,
}

impl ConsumerHandle {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Stop both loops at their next suspension point. A message already
    /// handed to the handler may be lost mid-flight; anything still in the
    /// store is untouched.
    pub fn abort(&self) {
        self.promoter.abort();
        self.dispatcher.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.promoter.is_finished() && self.dispatcher.is_finished()
    }
}

static GLOBAL: OnceLock<Queue> = OnceLock::new();

/// Install the process-wide default queue. Only the first call succeeds.
pub fn install(queue: Queue) -> Result<(), QueueError> {
    GLOBAL.set(queue).map_err(|_| QueueError::AlreadyInstalled)
}

pub fn global() -> Option<&'static Queue> {
    GLOBAL.get()
}
