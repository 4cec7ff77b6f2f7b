//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryStore**: 単一プロセス用の Store
//!
//! # 本番用実装
//! 本番用の実装は別クレートに配置します：
//! - `courier-redis`: RedisStore

pub mod inmem_store;

pub use self::inmem_store::InMemoryStore;
