//! Method - 名前で呼び出される処理
//!
//! # 学習ポイント
//! - Object-safe trait (Method)
//! - Type erasure パターン (TypedMethod<P, F> → dyn Method)

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::HandlerError;

/// A named operation invoked with the `Params` array of a method envelope.
#[async_trait]
pub trait Method: Send + Sync {
    async fn call(&self, params: Vec<Value>) -> Result<(), HandlerError>;
}

/// Untyped closure: receives the raw `Params` array.
pub struct FnMethod<F> {
    f: F,
}

impl<F> FnMethod<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Method for FnMethod<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn call(&self, params: Vec<Value>) -> Result<(), HandlerError> {
        (self.f)(params).await
    }
}

/// Typed closure: the `Params` array is decoded into `P` first.
///
/// A tuple works for positional params:
/// ```ignore
/// registry.register_typed("SendMail", |(to, retries): (String, u32)| async move {
///     mailer.send(&to, retries).await.map_err(HandlerError::failed)
/// })?;
/// ```
pub struct TypedMethod<P, F> {
    f: F,
    _marker: PhantomData<fn(P)>,
}

impl<P, F> TypedMethod<P, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<P, F, Fut> Method for TypedMethod<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn call(&self, params: Vec<Value>) -> Result<(), HandlerError> {
        let params: P =
            serde_json::from_value(Value::Array(params)).map_err(HandlerError::Decode)?;
        (self.f)(params).await
    }
}
