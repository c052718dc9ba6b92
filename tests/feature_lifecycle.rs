use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use feature_runtime::application::guards::{Guard, GuardContext, RequireRoles};
use feature_runtime::domain::traits::{CommandSync, ErrorContext, ErrorReporter, Responder};
use feature_runtime::domain::types::{
    Actor, CommandDefinition, CommandInvocation, CommandMetadata, EventPayload, FeatureDescriptor,
    FeatureState, InteractionInvocation, InteractionKind, MethodCall, MethodReply,
};
use feature_runtime::{
    CustomIdBuilder, Declarations, DispatchOutcome, EventHub, Feature, FeatureManager, InteractionPattern,
    ParsedCustomId, RuntimeConfig, SchedulerOptions,
};

#[derive(Default)]
struct Transcript {
    replies: Mutex<Vec<String>>,
}

#[async_trait]
impl Responder for Transcript {
    async fn reply(&self, content: &str, _ephemeral: bool) -> Result<(), String> {
        self.replies.lock().push(content.to_string());
        Ok(())
    }

    fn channel_id(&self) -> String {
        "lobby".to_string()
    }
}

#[derive(Default)]
struct Reports(Mutex<Vec<String>>);

#[async_trait]
impl ErrorReporter for Reports {
    async fn report(&self, error: &anyhow::Error, context: &ErrorContext) {
        self.0.lock().push(format!("{}.{}: {}", context.feature, context.method, error));
    }
}

#[derive(Default)]
struct Sink(Mutex<Vec<CommandDefinition>>);

#[async_trait]
impl CommandSync for Sink {
    async fn sync_commands(&self, commands: Vec<CommandDefinition>) -> Result<()> {
        *self.0.lock() = commands;
        Ok(())
    }
}

/// Records each evaluation and failure hook.
struct CountingGuard {
    seen: Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
    verdict: bool,
}

#[async_trait]
impl Guard for CountingGuard {
    async fn can_activate(&self, _ctx: &GuardContext) -> Result<bool> {
        self.seen.lock().push(self.label);
        Ok(self.verdict)
    }

    async fn on_fail(&self, ctx: &GuardContext) -> Result<()> {
        self.seen.lock().push("on_fail");
        ctx.invocation
            .responder()
            .reply("denied", true)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}

struct Poll {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Feature for Poll {
    fn metadata(&self) -> FeatureDescriptor {
        FeatureDescriptor::new("poll", "0.3.0").with_prefix("poll:")
    }

    fn methods(&self) -> &'static [&'static str] {
        &["create", "vote", "tally", "on_join", "fail"]
    }

    async fn call(&self, method: &str, call: MethodCall) -> Result<MethodReply> {
        self.calls.lock().push(method.to_string());
        match (method, call) {
            ("create", MethodCall::Command(cmd)) => {
                let id = CustomIdBuilder::new("vote").namespace("poll").arg("yes").build_checked()?;
                cmd.responder.reply(&id, false).await.map_err(|e| anyhow::anyhow!(e))?;
            }
            ("vote", MethodCall::Interaction(i)) => {
                let parsed = ParsedCustomId::parse(&i.custom_id);
                let choice = parsed.part(2).unwrap_or("?").to_string();
                i.responder.reply(&format!("voted {choice}"), true).await.map_err(|e| anyhow::anyhow!(e))?;
            }
            ("fail", _) => anyhow::bail!("poll storage offline"),
            _ => {}
        }
        Ok(MethodReply::Done)
    }

    fn declare(decl: &mut Declarations<'_>) {
        decl.command("create", CommandMetadata::new("poll", "Start a poll"))
            .command("fail", CommandMetadata::new("poll-broken", "Always fails"))
            .button("vote", InteractionPattern::rule("^vote:").expect("valid rule"))
            .on("on_join", "member_join")
            .schedule("tally", SchedulerOptions::every(Duration::from_secs(60)));
    }
}

fn runtime() -> (FeatureManager, Arc<EventHub>, Arc<Reports>) {
    let hub = Arc::new(EventHub::new());
    let reports = Arc::new(Reports::default());
    let manager = FeatureManager::new(RuntimeConfig::default(), hub.clone(), reports.clone());
    (manager, hub, reports)
}

fn command(name: &str, actor: Actor) -> (CommandInvocation, Arc<Transcript>) {
    let transcript = Arc::new(Transcript::default());
    (CommandInvocation::new(name, actor, transcript.clone()), transcript)
}

fn press(custom_id: &str) -> (InteractionInvocation, Arc<Transcript>) {
    let transcript = Arc::new(Transcript::default());
    (
        InteractionInvocation::new(InteractionKind::Button, custom_id, Actor::new("u1"), transcript.clone()),
        transcript,
    )
}

#[tokio::test]
async fn command_to_button_round_trip() {
    let (manager, hub, _) = runtime();
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register_feature(|| Poll { calls: calls.clone() }).await.unwrap();

    let (create, transcript) = command("poll", Actor::new("u1"));
    assert_eq!(manager.handle_command(create).await, DispatchOutcome::Handled);
    let custom_id = transcript.replies.lock()[0].clone();
    assert_eq!(custom_id, "poll:vote:yes");

    let (vote, transcript) = press(&custom_id);
    assert_eq!(manager.handle_interaction(vote).await, DispatchOutcome::Handled);
    assert_eq!(*transcript.replies.lock(), vec!["voted yes"]);

    hub.emit(EventPayload::new("member_join", serde_json::json!({"user": "u9"}))).await;
    assert_eq!(*calls.lock(), vec!["create", "vote", "on_join"]);
    manager.shutdown().await;
}

#[tokio::test]
async fn unknown_command_changes_nothing() {
    let (manager, _, reports) = runtime();
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register_feature(|| Poll { calls: calls.clone() }).await.unwrap();
    let before = manager.get_commands_for_sync();

    let (unknown, transcript) = command("nope", Actor::new("u1"));
    assert_eq!(manager.handle_command(unknown).await, DispatchOutcome::NotFound);

    assert!(calls.lock().is_empty());
    assert!(transcript.replies.lock().is_empty());
    assert!(reports.0.lock().is_empty());
    assert_eq!(manager.get_commands_for_sync(), before);
    manager.shutdown().await;
}

#[tokio::test]
async fn handler_errors_reach_the_reporter() {
    let (manager, _, reports) = runtime();
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register_feature(|| Poll { calls: calls.clone() }).await.unwrap();

    let (broken, _) = command("poll-broken", Actor::new("u1"));
    assert_eq!(manager.handle_command(broken).await, DispatchOutcome::Failed);
    assert_eq!(*reports.0.lock(), vec!["poll.fail: poll storage offline"]);
    manager.shutdown().await;
}

#[tokio::test]
async fn disable_and_reenable_round_trip() {
    let (manager, hub, _) = runtime();
    let calls = Arc::new(Mutex::new(Vec::new()));
    manager.register_feature(|| Poll { calls: calls.clone() }).await.unwrap();
    let sink = Sink::default();
    assert_eq!(manager.sync_commands(&sink).await.unwrap(), 2);
    let synced: Vec<_> = sink.0.lock().iter().map(|d| d.name.clone()).collect();
    assert_eq!(synced, vec!["poll", "poll-broken"]);

    manager.disable_feature("poll").await.unwrap();
    assert_eq!(manager.feature_state("poll"), Some(FeatureState::Disabled));
    assert!(manager.get_commands_for_sync().is_empty());
    assert_eq!(manager.interactions().len(InteractionKind::Button), 0);
    assert!(manager.scheduler().active_keys().is_empty());
    assert_eq!(hub.listener_count("member_join"), 0);

    let (vote, _) = press("poll:vote:yes");
    assert_eq!(manager.handle_interaction(vote).await, DispatchOutcome::NotFound);

    manager.enable_feature("poll").await.unwrap();
    assert_eq!(manager.get_commands_for_sync().len(), 2);
    assert_eq!(manager.scheduler().active_keys(), vec!["poll.tally"]);
    assert_eq!(hub.listener_count("member_join"), 1);
    let (vote, _) = press("poll:vote:no");
    assert_eq!(manager.handle_interaction(vote).await, DispatchOutcome::Handled);

    manager.unload_feature("poll").await.unwrap();
    assert!(manager.features().is_empty());
    assert!(manager.get_commands_for_sync().is_empty());
}

#[tokio::test]
async fn guards_short_circuit_in_order() {
    let (manager, _, _) = runtime();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    manager.registry().add_guards::<Poll>(
        "create",
        vec![
            Arc::new(RequireRoles::any(["member"])),
            Arc::new(CountingGuard {
                seen: seen.clone(),
                label: "a",
                verdict: false,
            }),
            Arc::new(CountingGuard {
                seen: seen.clone(),
                label: "b",
                verdict: true,
            }),
        ],
    );
    manager.register_feature(|| Poll { calls: calls.clone() }).await.unwrap();

    // Missing role: the role guard answers, nothing else runs.
    let (create, transcript) = command("poll", Actor::new("u1"));
    assert_eq!(manager.handle_command(create).await, DispatchOutcome::GuardRejected);
    assert_eq!(transcript.replies.lock().len(), 1);
    assert!(seen.lock().is_empty());

    let (create, transcript) = command("poll", Actor::new("u1").with_roles(["member"]));
    assert_eq!(manager.handle_command(create).await, DispatchOutcome::GuardRejected);
    assert_eq!(*seen.lock(), vec!["a", "on_fail"]);
    assert_eq!(*transcript.replies.lock(), vec!["denied"]);
    assert!(calls.lock().is_empty());
    manager.shutdown().await;
}
