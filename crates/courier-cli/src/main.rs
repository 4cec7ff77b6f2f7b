//! courier - queue の操作用 CLI
//!
//! - `publish`: topic に即時 / 遅延で投入
//! - `call`: `{Method, Params}` envelope を default topic に投入
//! - `consume`: topic を消費してログに出す（Ctrl-C で終了）
//! - `status`: ready / delayed の件数
//! - `demo`: in-memory store で一通り動かす

mod config;
mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use courier_core::logging::init_logging;
use courier_core::{HandlerError, InMemoryStore, Message, Queue, Store, Topic, handler_fn};
use courier_redis::{RedisConfig, RedisStore};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Store-backed delayed message queue")]
struct Cli {
    /// Extra config file, applied after `config/courier.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use Redis at this URL instead of the configured store.
    #[arg(long, global = true)]
    redis_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish a message to a topic.
    Publish {
        #[arg(long, short)]
        topic: String,
        /// Seconds to wait before the message becomes ready.
        #[arg(long, short)]
        delay: Option<u64>,
        message: String,
    },
    /// Publish a method call to the default topic.
    Call {
        method: String,
        /// JSON array of positional params.
        #[arg(long, short, default_value = "[]")]
        params: String,
        #[arg(long, short)]
        delay: Option<u64>,
    },
    /// Consume a topic and log every message.
    Consume {
        #[arg(long, short)]
        topic: Option<String>,
    },
    /// Show pending counts of a topic.
    Status {
        #[arg(long, short)]
        topic: Option<String>,
    },
    /// Run the in-memory demo.
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.redis_url {
        config.redis = Some(RedisConfig {
            url,
            ..config.redis.unwrap_or_default()
        });
    }
    let _guard = init_logging(config.queue.debug, &config.logging)?;

    let store: Arc<dyn Store> = match cli.command {
        Command::Demo => Arc::new(InMemoryStore::new()),
        _ => connect(&config).await?,
    };
    let queue = Queue::new(store, config.queue.clone());
    let topic_or_default =
        |topic: Option<String>| topic.map(Topic::new).unwrap_or_else(|| queue.default_topic());

    match cli.command {
        Command::Publish {
            topic,
            delay,
            message,
        } => {
            let topic = Topic::new(topic);
            let message = Message::text(message);
            match delay {
                Some(delay) => queue.publish_delayed(&topic, message, delay).await?,
                None => queue.publish(&topic, message).await?,
            };
            tracing::info!(%topic, ?delay, "published");
        }
        Command::Call {
            method,
            params,
            delay,
        } => {
            let params: Vec<Value> =
                serde_json::from_str(&params).context("--params must be a JSON array")?;
            match delay {
                Some(delay) => queue.publish_method_delayed(method.clone(), params, delay).await?,
                None => queue.publish_method(method.clone(), params).await?,
            };
            tracing::info!(%method, ?delay, "method call published");
        }
        Command::Consume { topic } => {
            let topic = topic_or_default(topic);
            let handler = handler_fn(|topic: Topic, message: String| async move {
                tracing::info!(%topic, %message, "received");
                Ok::<(), HandlerError>(())
            });
            let handle = queue.start_consuming(topic, Arc::new(handler));
            tokio::signal::ctrl_c().await?;
            tracing::info!(topic = %handle.topic(), "shutting down consumer");
            handle.abort();
        }
        Command::Status { topic } => {
            let topic = topic_or_default(topic);
            let counts = queue.counts(&topic).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Command::Demo => demo::run(queue.clone(), config.pool.max_workers).await?,
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match &config.redis {
        Some(redis) => {
            let store = RedisStore::connect(redis)
                .await
                .with_context(|| format!("cannot connect to {}", redis.url))?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no redis configured; using a process-local in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
