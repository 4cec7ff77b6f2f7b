//! Handler - 1 メッセージを処理する口
//!
//! # 二層構造
//! - **MessageHandler**: dispatcher が呼ぶ唯一の契約（topic + 生テキスト）
//! - **MethodRegistry**: `{Method, Params}` envelope を名前で振り分けるデフォルト実装

pub mod method;
pub mod registry;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Topic;

pub use self::method::{FnMethod, Method, TypedMethod};
pub use self::registry::{MethodRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("method `{0}` is not registered")]
    MethodNotFound(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(err: impl fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Handles one message popped from a topic's ready list.
///
/// Returning `Err` (or panicking) makes the dispatcher re-queue the message
/// through the delay set.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, topic: &Topic, message: &str) -> Result<(), HandlerError>;
}

/// Closure-backed [`MessageHandler`].
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Topic, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Topic, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, topic: &Topic, message: &str) -> Result<(), HandlerError> {
        (self.f)(topic.clone(), message.to_string()).await
    }
}
