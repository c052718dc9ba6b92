//! Shared fixtures for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::application::feature::Feature;
use crate::application::guards::{Guard, GuardContext};
use crate::domain::traits::{ErrorContext, ErrorReporter, Responder};
use crate::domain::types::{
    Actor, CommandInvocation, FeatureDescriptor, Invocation, MethodCall, MethodReply, OptionChoice,
};

/// Responder that records replies.
#[derive(Default)]
pub struct RecordingResponder {
    pub replies: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl Responder for RecordingResponder {
    async fn reply(&self, content: &str, ephemeral: bool) -> Result<(), String> {
        self.replies.lock().push((content.to_string(), ephemeral));
        Ok(())
    }

    fn channel_id(&self) -> String {
        "test-channel".to_string()
    }
}

/// Reporter that records `feature.method: error` lines.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<String>>,
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, error: &anyhow::Error, context: &ErrorContext) {
        self.reports
            .lock()
            .push(format!("{}.{}: {}", context.feature, context.method, error));
    }
}

pub fn command_ctx(actor: Actor) -> (GuardContext, Arc<RecordingResponder>) {
    let responder = Arc::new(RecordingResponder::default());
    let invocation = CommandInvocation::new("ping", actor, responder.clone());
    (
        GuardContext {
            invocation: Invocation::Command(invocation),
            feature: "test".into(),
            method: "ping".into(),
        },
        responder,
    )
}

/// Feature that logs every call as `method` and fails on `"explode"`.
pub struct Recorder {
    pub name: &'static str,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Feature for Recorder {
    fn metadata(&self) -> FeatureDescriptor {
        FeatureDescriptor::new(self.name, "0.1.0")
    }

    fn methods(&self) -> &'static [&'static str] {
        &["run", "other", "explode", "suggest", "tick"]
    }

    async fn call(&self, method: &str, call: MethodCall) -> Result<MethodReply> {
        self.calls.lock().push(method.to_string());
        match (method, call) {
            ("explode", _) => anyhow::bail!("boom"),
            ("suggest", MethodCall::Autocomplete(a)) => Ok(MethodReply::Choices(vec![
                OptionChoice::new(format!("{}-1", a.value), a.value.clone()),
            ])),
            _ => Ok(MethodReply::Done),
        }
    }
}

/// Guard with a fixed verdict.
pub struct Fixed(pub bool);

#[async_trait]
impl Guard for Fixed {
    async fn can_activate(&self, _ctx: &GuardContext) -> Result<bool> {
        Ok(self.0)
    }
}
