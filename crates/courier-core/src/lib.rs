//! courier-core
//!
//! Store-backed at-least-once message queue with delayed delivery, plus a
//! bounded in-process worker pool.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Topic, Message, DelayedMember, MethodCall）
//! - **ports**: 抽象化レイヤー（Store, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryStore）
//! - **queue**: publish / delay promoter / dispatcher / supervisor
//! - **handler**: MessageHandler と method 名による dispatch
//! - **app**: ConsumerBuilder（起動時検証）
//! - **pool**: WorkerPool と TaskResult
//! - **config / logging / observability**: 設定値、ログ初期化、キュー状態
//!
//! # 使用例
//! ```ignore
//! let queue = Queue::new(Arc::new(InMemoryStore::new()), QueueConfig::default());
//! let consumer = ConsumerBuilder::new()
//!     .method_typed("SendMail", |(to,): (String,)| async move { mailer::send(&to).await })?
//!     .build()?;
//! let _handle = consumer.start_on_default_topic(&queue);
//! queue.publish_method_delayed("SendMail", vec![json!("a@example.com")], 30).await?;
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod handler;
pub mod impls;
pub mod logging;
pub mod observability;
pub mod pool;
pub mod ports;
pub mod queue;

mod panic;

pub use crate::app::{BuildError, Consumer, ConsumerBuilder};
pub use crate::config::{LoggingConfig, PoolConfig, QueueConfig};
pub use crate::domain::{Message, MethodCall, Topic};
pub use crate::error::{QueueError, StoreError};
pub use crate::handler::{HandlerError, MessageHandler, MethodRegistry, handler_fn};
pub use crate::impls::InMemoryStore;
pub use crate::observability::QueueCounts;
pub use crate::pool::{PoolError, TaskResult, TaskStatus, WorkerPool};
pub use crate::ports::Store;
pub use crate::queue::{ConsumerHandle, Queue};
