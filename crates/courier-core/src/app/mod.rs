//! App - アプリケーション層
//!
//! handler と queue を組み合わせて、起動時検証済みの consumer を作る。
//!
//! # 主要コンポーネント
//! - **ConsumerBuilder**: method の登録と期待集合のチェック
//! - **Consumer**: 検証済み MethodRegistry を topic に接続する

pub mod builder;

pub use self::builder::{BuildError, Consumer, ConsumerBuilder};
