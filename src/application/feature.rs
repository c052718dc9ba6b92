//! # Feature Contract
//!
//! A feature is a self-contained bundle of handlers plus lifecycle hooks. Its capabilities
//! are declared per method on the type (`declare`), before any instance exists; an
//! instance lists the methods it exposes and dispatches calls to them by name.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::application::logging::FeatureLogger;
use crate::application::rate_limiter::RateLimiter;
use crate::application::registry::Declarations;
use crate::domain::types::{FeatureDescriptor, MethodCall, MethodReply};

#[async_trait]
pub trait Feature: Send + Sync + 'static {
    fn metadata(&self) -> FeatureDescriptor;

    /// Methods this instance exposes for binding. Declarations for any other method
    /// name are dropped when the instance is bound.
    fn methods(&self) -> &'static [&'static str];

    /// Invoke one of the exposed methods.
    async fn call(&self, method: &str, call: MethodCall) -> Result<MethodReply>;

    async fn on_load(&self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    async fn on_enable(&self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    async fn on_disable(&self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    async fn on_unload(&self, _ctx: &FeatureContext) -> Result<()> {
        Ok(())
    }

    /// Record per-method capabilities for this type. Runs once per type.
    fn declare(_decl: &mut Declarations<'_>)
    where
        Self: Sized,
    {
    }
}

/// Per-feature context handed to lifecycle hooks.
#[derive(Clone)]
pub struct FeatureContext {
    pub name: String,
    pub version: String,
    /// Free-form settings from the `features.<name>.settings` config section.
    pub settings: serde_json::Value,
    pub logger: FeatureLogger,
    /// Shared limiter for outbound calls.
    pub outbound: RateLimiter,
}

/// A method reference bound to one specific feature instance.
#[derive(Clone)]
pub struct BoundHandler {
    feature: Arc<dyn Feature>,
    method: &'static str,
}

impl BoundHandler {
    pub(crate) fn new(feature: Arc<dyn Feature>, method: &'static str) -> Self {
        Self { feature, method }
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub async fn invoke(&self, call: MethodCall) -> Result<MethodReply> {
        self.feature.call(self.method, call).await
    }

    /// Whether both handlers point into the same feature instance.
    pub fn same_instance(&self, other: &BoundHandler) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.feature) as *const (),
            Arc::as_ptr(&other.feature) as *const (),
        )
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
