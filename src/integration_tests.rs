//! End-to-end tests driving a domain task through the renderer.

use crate::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn ok_stage(name: &str) -> Stage {
    let key = format!("{name}_done");
    Stage::new(name, move |_ctx| Ok(outcome::value(key.clone(), json!(true))))
}

#[test]
fn test_all_success_render() {
    init_tracing();
    let mut task = Task::new();
    task.add(ok_stage("fetch"))
        .add(ok_stage("process"))
        .add(ok_stage("save"));
    task.run().unwrap();

    let renderer = Renderer::new(&task, RenderOptions::new("http://api.example.com", "123"));
    let response = renderer.render().unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "application/hal+json");

    let body = &response.body;
    assert_eq!(body["_links"]["self"]["href"], json!("http://api.example.com/tasks/123"));
    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["completed_stages"], json!(["fetch", "process", "save"]));
    assert_eq!(body["total_stages"], json!(3));
    assert!(body.get("current_stage").is_none());
    assert!(body["_links"].get("start").is_none());
    assert!(body["_links"].get("retry").is_none());

    let stages = body["_embedded"]["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 3);
}

#[test]
fn test_failed_task_still_renders() {
    init_tracing();
    let mut task = Task::new();
    task.add(ok_stage("fetch"))
        .add(Stage::new("risky", |_ctx| panic!("connection reset")));

    let failure = task.run().unwrap_err();
    assert_eq!(failure.get("stage"), Some(&json!("risky")));

    // Render success is independent of task success.
    let renderer = Renderer::new(&task, RenderOptions::new("http://api.example.com", "123"));
    let response = renderer.render().unwrap();

    assert_eq!(response.status, 500);

    let body = &response.body;
    assert_eq!(body["status"], json!("failed"));
    assert_eq!(body["failed_stages"], json!(["risky"]));
    assert_eq!(
        body["_links"]["retry"]["href"],
        json!("http://api.example.com/tasks/123/retry")
    );

    let errors = body["_embedded"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["error"], json!("connection reset"));
    assert_eq!(errors[0]["stage"], json!("risky"));
}

#[test]
fn test_unexecuted_task_renders_pending_200() {
    init_tracing();
    let mut task = Task::new();
    task.add(ok_stage("fetch")).add(ok_stage("save"));

    let response = Renderer::new(&task, RenderOptions::default()).render().unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["status"], json!("pending"));
    assert_eq!(response.body["current_stage"], json!("fetch"));
    assert!(response.body.get("completed_stages").is_none());
}

#[test]
fn test_partial_progress_renders_202() {
    init_tracing();
    let mut partial = Task::new();
    partial
        .add(Stage::new("fetch", |_ctx| Ok(Payload::new())))
        .add(ok_stage("save"));

    // Stop after the first stage by routing past the end.
    let _ = partial.run_conditional(|_payload, index| if index == 0 { 99 } else { index + 1 });

    let renderer = Renderer::new(&partial, RenderOptions::new("http://h", "1"));
    let response = renderer.render().unwrap();

    assert_eq!(response.status, 202);
    assert_eq!(response.body["status"], json!("running"));
    assert_eq!(response.body["current_stage"], json!("save"));
    assert_eq!(
        response.body["_links"]["next_stage"]["href"],
        json!("http://h/tasks/1/stages/save")
    );
}

#[test]
fn test_stage_work_runs_once_across_task_and_renderer() {
    init_tracing();
    let calls = Rc::new(Cell::new(0));
    let observed = Rc::clone(&calls);

    let mut task = Task::new();
    task.add(Stage::new("counted", move |_ctx| {
        observed.set(observed.get() + 1);
        Ok(Payload::new())
    }));

    task.run().unwrap();
    let renderer = Renderer::new(&task, RenderOptions::default());
    renderer.render().unwrap();
    renderer.render().unwrap();
    task.run().unwrap();

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_context_accumulates_across_stages() {
    init_tracing();
    let mut task = Task::new();
    task.add(Stage::new("fetch", |_ctx| {
        Ok(outcome::value("records", json!([1, 2, 3])))
    }))
    .add(Stage::new("process", |ctx| {
        let count = ctx
            .get("records")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        Ok(outcome::value("processed", json!(count)))
    }));

    let run = task.run().unwrap();

    assert_eq!(run["context"]["processed"], json!(3));
    assert_eq!(run["completed"], json!(["fetch", "process"]));
}

#[test]
fn test_precondition_failure_aborts_task() {
    init_tracing();
    let mut task = Task::new();
    task.add(ok_stage("fetch")).add(
        Stage::new("guarded", |_ctx| Ok(Payload::new()))
            .with_precondition(|ctx| ctx.contains_key("approval")),
    );

    let failure = task.run().unwrap_err();

    assert_eq!(failure["stage"], json!("guarded"));
    assert_eq!(
        failure["details"]["error"],
        json!("Preconditions not met for stage: guarded")
    );

    let response = Renderer::new(&task, RenderOptions::default()).render().unwrap();
    assert_eq!(response.status, 500);
    assert_eq!(response.body["status"], json!("failed"));
}
