//! Pool - 固定数 worker による in-process 並行実行
//!
//! # 主要コンポーネント
//! - **WorkerPool**: 共有 intake channel から task を取り出す worker 群
//! - **TaskResult**: task ごとの結果（success / fail、任意の並び替え index）
//! - **business_handle / fast_pool**: panic を結果に変換する薄いヘルパー
//!
//! # 設計原則
//! - task の失敗（Err でも panic でも）は pool を落とさない
//! - intake は容量 1。空きがなければ `submit` が待つ
//! - cancel は新規受付を止めるだけ。実行中の task は最後まで走る

mod business;
mod result;
mod worker_pool;

pub use self::business::{business_handle, fast_pool, fast_pool_with_cancel};
pub use self::result::{TaskResult, TaskStatus};
pub use self::worker_pool::WorkerPool;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool intake is closed")]
    Closed,

    #[error("pool was cancelled")]
    Cancelled,

    #[error("pool workers are already running")]
    AlreadyRunning,
}
