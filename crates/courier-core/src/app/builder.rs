//! ConsumerBuilder - method consumer の構築
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発体験の改善（明確なエラーメッセージ）

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::Topic;
use crate::handler::{HandlerError, Method, MethodRegistry, RegistryError};
use crate::queue::{ConsumerHandle, Queue};

/// ConsumerBuilder は method を登録して Consumer を作る
///
/// # 使用例
/// ```ignore
/// let consumer = ConsumerBuilder::new()
///     .method_typed("SendMail", |(to,): (String,)| async move { send(&to).await })?
///     .expect_methods(&["SendMail", "Resize"])
///     .build()?;
/// let handle = consumer.start_on_default_topic(&queue);
/// ```
///
/// # Fail-fast 設計
/// - expect_methods() で期待される method 名を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
/// - 不足があれば BuildError を返す
#[derive(Default)]
pub struct ConsumerBuilder {
    registry: MethodRegistry,
    expected_methods: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing methods: {0:?}. These methods were expected but not registered.")]
    MissingMethods(Vec<String>),
}

impl ConsumerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<M: Method + 'static>(
        mut self,
        name: impl Into<String>,
        method: M,
    ) -> Result<Self, RegistryError> {
        self.registry.register(name, method)?;
        Ok(self)
    }

    /// Closure taking the raw `Params` array.
    pub fn method_fn<F, Fut>(mut self, name: impl Into<String>, f: F) -> Result<Self, RegistryError>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.registry.register_fn(name, f)?;
        Ok(self)
    }

    /// Closure taking `Params` decoded into `P`.
    pub fn method_typed<P, F, Fut>(
        mut self,
        name: impl Into<String>,
        f: F,
    ) -> Result<Self, RegistryError>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.registry.register_typed(name, f)?;
        Ok(self)
    }

    pub fn expect_methods(mut self, names: &[&str]) -> Self {
        self.expected_methods = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Consumer, BuildError> {
        if let Some(expected) = &self.expected_methods {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| self.registry.get(name).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingMethods(missing));
            }
        }
        Ok(Consumer {
            registry: Arc::new(self.registry),
        })
    }
}

/// Validated method table, ready to be attached to a topic.
#[derive(Clone)]
pub struct Consumer {
    registry: Arc<MethodRegistry>,
}

impl Consumer {
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn start(&self, queue: &Queue, topic: Topic) -> ConsumerHandle {
        tracing::info!(%topic, methods = ?self.registry.names(), "starting method consumer");
        queue.start_consuming(topic, self.registry.clone())
    }

    /// Consume the queue's default topic, where `publish_method` sends.
    pub fn start_on_default_topic(&self, queue: &Queue) -> ConsumerHandle {
        self.start(queue, queue.default_topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::impls::InMemoryStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    async fn noop(_: Vec<Value>) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn build_success() {
        let consumer = ConsumerBuilder::new()
            .method_fn("SendMail", noop)
            .unwrap()
            .expect_methods(&["SendMail"])
            .build();
        assert!(consumer.is_ok());
    }

    #[test]
    fn build_missing_methods() {
        let consumer = ConsumerBuilder::new()
            .method_fn("SendMail", noop)
            .unwrap()
            .expect_methods(&["SendMail", "Resize"])
            .build();
        assert!(matches!(
            consumer,
            Err(BuildError::MissingMethods(missing)) if missing == vec!["Resize".to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        let consumer = ConsumerBuilder::new().build().unwrap();
        assert!(consumer.registry().is_empty());
    }

    #[test]
    fn duplicate_method_is_rejected() {
        let result = ConsumerBuilder::new()
            .method_fn("SendMail", noop)
            .unwrap()
            .method_fn("SendMail", noop);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn started_consumer_runs_published_methods() {
        let queue = Queue::new(Arc::new(InMemoryStore::new()), QueueConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let consumer = ConsumerBuilder::new()
            .method_typed("Greet", move |(name,): (String,)| {
                let tx = tx.clone();
                async move { tx.send(format!("hello {name}")).map_err(HandlerError::failed) }
            })
            .unwrap()
            .build()
            .unwrap();
        let handle = consumer.start_on_default_topic(&queue);

        queue
            .publish_method("Greet", vec![json!("courier")])
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello courier");
        assert_eq!(handle.topic().as_str(), "courier");

        handle.abort();
    }
}
