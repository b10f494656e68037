mod common;

use common::*;
use dispatch_core::agent::{AgentError, Role, ScriptedModel};
use dispatch_core::dispatcher::analysis_tools;
use dispatch_core::pipeline::{Pipeline, Stage};
use dispatch_core::{Config, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn analysis_registry(git: Arc<StubGit>) -> Arc<ToolRegistry> {
    let backends = backends(Arc::new(StubSearch::with_hit("src/PaymentProcessor.java")), git);
    Arc::new(analysis_tools(&backends, &Config::default()).unwrap())
}

#[tokio::test]
async fn test_second_stage_receives_first_stage_output() {
    let first = Arc::new(ScriptedModel::answering("alice owns PaymentProcessor"));
    let second = Arc::new(ScriptedModel::answering("{\"summary\":\"s\",\"assignees\":[]}"));
    let pipeline = Pipeline::new()
        .stage(Stage::new("analyze", first.clone(), analysis_registry(Arc::new(StubGit::blaming("alice"))), "analyze prompt"))
        .stage(Stage::new("format", second.clone(), Arc::new(ToolRegistry::empty()), "format prompt"));

    let out = assert_ok!(pipeline.run("NPE in checkout").await);
    assert_eq!(out, "{\"summary\":\"s\",\"assignees\":[]}");

    let first_request = &first.requests()[0];
    assert_eq!(first_request.messages[1].content, "NPE in checkout");

    let second_request = &second.requests()[0];
    assert_eq!(second_request.messages.len(), 2);
    assert_eq!(second_request.messages[0].content, "format prompt");
    assert_eq!(second_request.messages[1].role, Role::User);
    assert_eq!(second_request.messages[1].content, "alice owns PaymentProcessor");
    assert!(second_request.tool_names.is_empty());
}

#[tokio::test]
async fn test_first_stage_failure_skips_second_stage() {
    let first = Arc::new(ScriptedModel::new().then_fail(AgentError::ModelTransport("503".into())));
    let second = Arc::new(ScriptedModel::answering("never"));
    let pipeline = Pipeline::new()
        .stage(Stage::new("analyze", first, Arc::new(ToolRegistry::empty()), "a"))
        .stage(Stage::new("format", second.clone(), Arc::new(ToolRegistry::empty()), "f"));

    let err = assert_err!(pipeline.run("ticket").await);
    assert_eq!(err, AgentError::ModelTransport("503".into()));
    assert_eq!(second.call_count(), 0);
}

#[tokio::test]
async fn test_second_stage_failure_keeps_first_stage_events() {
    let (bus, mut stream) = setup_event_bus();
    let first = Arc::new(
        ScriptedModel::new()
            .then_call("git_blame", json!({"path": "src/PaymentProcessor.java"}))
            .then_answer("alice"),
    );
    let second = Arc::new(ScriptedModel::new().then_fail(AgentError::ModelTransport("reset".into())));
    let pipeline = Pipeline::new()
        .stage(Stage::new("analyze", first, analysis_registry(Arc::new(StubGit::blaming("alice"))), "a"))
        .stage(Stage::new("format", second, Arc::new(ToolRegistry::empty()), "f"))
        .with_event_sender(bus.sender());

    let err = assert_err!(pipeline.run("ticket").await);
    assert_eq!(err, AgentError::ModelTransport("reset".into()));
    assert_eq!(
        summarize(&collect_events(&mut stream)),
        vec![("CALL", "git_blame".to_string()), ("OK", "git_blame".to_string())]
    );
}

#[tokio::test]
async fn test_toolless_stage_is_bounded() {
    let first = Arc::new(ScriptedModel::answering("analysis"));
    let second = Arc::new(ScriptedModel::always_calling("search", json!({"text": "x"})));
    let pipeline = Pipeline::new()
        .stage(Stage::new("analyze", first, Arc::new(ToolRegistry::empty()), "a"))
        .stage(Stage::new("format", second.clone(), Arc::new(ToolRegistry::empty()), "f").with_max_iterations(10));

    let err = assert_err!(pipeline.run("ticket").await);
    assert_eq!(err, AgentError::IterationLimitExceeded { limit: 10 });
    assert_eq!(second.call_count(), 10);

    let feedback = &second.requests()[1].messages[3];
    assert!(feedback.content.contains("No tools are available"));
}

#[tokio::test]
async fn test_empty_pipeline_returns_input() {
    let pipeline = Pipeline::new();
    assert!(pipeline.stages().is_empty());
    assert_eq!(assert_ok!(pipeline.run("as is").await), "as is");
}
