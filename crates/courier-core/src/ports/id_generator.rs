//! IdGenerator port - ID 生成の抽象化
//!
//! Delay-set members are tagged with a ULID so identical payloads do not
//! collapse into one sorted-set entry.
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use std::sync::Arc;

use ulid::Ulid;

use crate::ports::Clock;

/// IdGenerator は delay member 用のタグを生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Ulid;
}

/// UlidGenerator は Clock の時刻 + ランダム部分で ULID を生成
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
