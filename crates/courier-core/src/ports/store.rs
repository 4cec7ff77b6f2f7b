//! Store port - 外部 KV ストア（Redis または InMemory）
//!
//! The queue keeps no state of its own. Everything pending lives in the
//! store: a FIFO list per topic and a score-ordered set per topic.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Store は list / sorted set / 単純な key-value を提供
///
/// # 設計原則
/// - The store is the single source of truth. Restarting the process loses
///   nothing that was already pushed.
/// - Sorted-set range/remove must be atomic per call; cross-process
///   coordination is delegated to the backend.
/// - `list_blocking_pop` waits forever. It is the dispatcher's only
///   suspension point.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append to the tail of a list. Returns the new length.
    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Prepend to the head of a list. Returns the new length.
    async fn list_push_front(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Pop the head of a list, waiting until one is available.
    async fn list_blocking_pop(&self, key: &str) -> Result<String, StoreError>;

    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Insert or update a member. Returns the number of newly added members.
    async fn sorted_set_insert(&self, key: &str, member: &str, score: f64)
    -> Result<u64, StoreError>;

    /// Members with scores between rank `start` and `stop` (inclusive,
    /// negative ranks count from the end), lowest score first.
    async fn sorted_set_range_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    /// Remove an exact member. Absent members are not an error.
    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<u64, StoreError>;

    async fn sorted_set_len(&self, key: &str) -> Result<u64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError>;
}

/// Resolve Redis-style inclusive ranks against a collection of `len` items.
///
/// Returns `None` when the range selects nothing.
pub fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}
