//! Ports - 抽象化レイヤー
//!
//! 外部システム（Redis など）や時刻・ID 生成へのインターフェースを定義します。
//! 実装は `impls`（InMemory）と `courier-redis` クレートにあります。

pub mod clock;
pub mod id_generator;
pub mod store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::store::Store;
