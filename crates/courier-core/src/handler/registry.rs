//! MethodRegistry - method 名から処理への振り分け
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Arc による共有所有権
//! - reflection を使わない「名前で呼ぶ」dispatch

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::method::{FnMethod, Method, TypedMethod};
use super::{HandlerError, MessageHandler};
use crate::domain::{MethodCall, Topic};

/// Name → method table, built at startup and read-only afterwards.
///
/// As a [`MessageHandler`] it decodes each message as a [`MethodCall`]
/// envelope and invokes the named method with its params.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn Method>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("method '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Method + 'static>(
        &mut self,
        name: impl Into<String>,
        method: M,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.methods.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.methods.insert(name, Arc::new(method));
        Ok(())
    }

    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(name, FnMethod::new(f))
    }

    pub fn register_typed<P, F, Fut>(
        &mut self,
        name: impl Into<String>,
        f: F,
    ) -> Result<(), RegistryError>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(name, TypedMethod::<P, F>::new(f))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Method>> {
        self.methods.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[async_trait]
impl MessageHandler for MethodRegistry {
    async fn handle(&self, _topic: &Topic, message: &str) -> Result<(), HandlerError> {
        let call: MethodCall = serde_json::from_str(message).map_err(HandlerError::Decode)?;
        let method = self
            .get(&call.method)
            .ok_or_else(|| HandlerError::MethodNotFound(call.method.clone()))?;
        method.call(call.params).await
    }
}
