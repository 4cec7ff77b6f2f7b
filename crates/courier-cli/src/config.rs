//! AppConfig - CLI の設定読み込み
//!
//! # 優先順位（後勝ち）
//! 1. 組み込みデフォルト（各 struct の `Default`）
//! 2. `config/courier.toml`（存在すれば）
//! 3. `--config` で指定したファイル
//! 4. `COURIER__*` 環境変数（例: `COURIER__QUEUE__RETRY_WAIT_SECONDS=10`）

use std::path::Path;

use config::{Case, Config, Environment, File};
use serde::{Deserialize, Serialize};

use courier_core::{LoggingConfig, PoolConfig, QueueConfig};
use courier_redis::RedisConfig;

const ENV_VAR_PREFIX: &str = "COURIER";
const ENV_VAR_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_FILE: &str = "config/courier";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    pub queue: QueueConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
    /// In-memory store when absent.
    pub redis: Option<RedisConfig>,
}

impl AppConfig {
    // tracing の初期化前に呼ばれる
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder =
            Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_VAR_PREFIX)
                    .convert_case(Case::Kebab)
                    .separator(ENV_VAR_SEPARATOR),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = from_toml("");
        assert_eq!(config.queue, QueueConfig::default());
        assert_eq!(config.pool.max_workers, 100);
        assert!(config.redis.is_none());
    }

    #[test]
    fn kebab_case_keys_override_defaults() {
        let config = from_toml(
            r#"
            [queue]
            debug = false
            retry-wait-seconds = 10
            key-prefix = "app:"

            [pool]
            max-workers = 8

            [redis]
            url = "redis://cache:6379"
            "#,
        );
        assert!(!config.queue.debug);
        assert_eq!(config.queue.retry_wait_seconds, 10);
        assert_eq!(config.queue.auto_boot_time, 3);
        assert_eq!(config.queue.key_prefix, "app:");
        assert_eq!(config.pool.max_workers, 8);
        assert_eq!(
            config.redis.map(|redis| redis.url),
            Some("redis://cache:6379".to_string())
        );
    }
}
