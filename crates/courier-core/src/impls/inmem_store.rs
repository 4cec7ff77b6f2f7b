//! InMemoryStore - 開発用・単一プロセス用のストア
//!
//! # 実装詳細
//! - tokio Mutex で状態全体を保護
//! - Notify で push 時に blocking pop を起こす
//! - sorted set は (score, member) の BTreeSet + member -> score の HashMap

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::error::StoreError;
use crate::ports::Store;
use crate::ports::store::resolve_range;

/// f64 score with a total order, so it can live in a BTreeSet.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) -> u64 {
        let added = match self.scores.insert(member.to_string(), score) {
            Some(previous) => {
                self.ordered.remove(&(Score(previous), member.to_string()));
                0
            }
            None => 1,
        };
        self.ordered.insert((Score(score), member.to_string()));
        added
    }

    fn remove(&mut self, member: &str) -> u64 {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(Score(score), member.to_string()));
                1
            }
            None => 0,
        }
    }

    fn range(&self, start: isize, stop: isize) -> Vec<(String, f64)> {
        let Some((start, stop)) = resolve_range(self.ordered.len(), start, stop) else {
            return Vec::new();
        };
        self.ordered
            .iter()
            .skip(start)
            .take(stop - start + 1)
            .map(|(score, member)| (member.clone(), score.0))
            .collect()
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, SortedSet>,
    values: HashMap<String, (String, Option<Instant>)>,
    closed: bool,
}

/// InMemoryStore は Store の in-process 実装
///
/// # 使用例
/// ```ignore
/// let store = Arc::new(InMemoryStore::new());
/// store.list_push("orders.queue", "{\"id\":1}").await?;
/// let value = store.list_blocking_pop("orders.queue").await?;
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
    notify: Arc<Notify>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent call with [`StoreError::Closed`] and wake
    /// blocked pops.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    /// Snapshot of a list, head first (for tests and inspection).
    pub async fn list_snapshot(&self, key: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of a sorted set, lowest score first.
    pub async fn sorted_set_snapshot(&self, key: &str) -> Vec<(String, f64)> {
        let state = self.state.lock().await;
        state
            .sets
            .get(key)
            .map(|set| set.range(0, -1))
            .unwrap_or_default()
    }
}

fn ensure_open(state: &InMemoryState) -> Result<(), StoreError> {
    if state.closed {
        return Err(StoreError::Closed);
    }
    Ok(())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let len = {
            let mut state = self.state.lock().await;
            ensure_open(&state)?;
            let list = state.lists.entry(key.to_string()).or_default();
            list.push_back(value.to_string());
            list.len() as u64
        };

        // 待機中の pop をすべて起こす（key が違えば再度待機する）
        self.notify.notify_waiters();
        Ok(len)
    }

    async fn list_push_front(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let len = {
            let mut state = self.state.lock().await;
            ensure_open(&state)?;
            let list = state.lists.entry(key.to_string()).or_default();
            list.push_front(value.to_string());
            list.len() as u64
        };
        self.notify.notify_waiters();
        Ok(len)
    }

    async fn list_blocking_pop(&self, key: &str) -> Result<String, StoreError> {
        loop {
            // lock 前に登録しておくことで、確認と待機の間の push を取りこぼさない
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                ensure_open(&state)?;
                if let Some(list) = state.lists.get_mut(key)
                    && let Some(value) = list.pop_front()
                {
                    if list.is_empty() {
                        state.lists.remove(key);
                    }
                    return Ok(value);
                }
            }

            notified.await;
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        ensure_open(&state)?;
        Ok(state.lists.get(key).map_or(0, |list| list.len() as u64))
    }

    async fn sorted_set_insert(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;
        Ok(state
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member, score))
    }

    async fn sorted_set_range_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let state = self.state.lock().await;
        ensure_open(&state)?;
        Ok(state
            .sets
            .get(key)
            .map(|set| set.range(start, stop))
            .unwrap_or_default())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;
        let Some(set) = state.sets.get_mut(key) else {
            return Ok(0);
        };
        let removed = set.remove(member);
        if set.len() == 0 {
            state.sets.remove(key);
        }
        Ok(removed)
    }

    async fn sorted_set_len(&self, key: &str) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        ensure_open(&state)?;
        Ok(state.sets.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;
        let expired = matches!(
            state.values.get(key),
            Some((_, Some(expires_at))) if *expires_at <= Instant::now()
        );
        if expired {
            state.values.remove(key);
            return Ok(None);
        }
        Ok(state.values.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        state
            .values
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        ensure_open(&state)?;
        let mut removed = 0;
        for key in keys {
            let hit = state.values.remove(*key).is_some()
                | state.lists.remove(*key).is_some()
                | state.sets.remove(*key).is_some();
            if hit {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
