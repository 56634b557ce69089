mod common;

use std::sync::Arc;

use common::{wait_for_samples, wait_for_state, FakeBackend};
use livetrace::control::{Command, Controller, Reply};
use livetrace::domain::{ControlError, Pid};
use livetrace::headless::serve_line;
use livetrace::process_directory::ProcessDirectory;
use livetrace_common::SessionState;

fn controller() -> (FakeBackend, Controller) {
    let backend = FakeBackend::new();
    backend.add_target(1234, "/usr/bin/server", &[1234, 1235], &[0x1010, 0x2020]);
    backend.add_target(2000, "/opt/tools/worker-1234", &[2000], &[0x3030]);
    backend.add_target(3000, "/usr/bin/my-app", &[3000], &[0x4040]);
    backend.add_function(0x1000, "server::handle");
    let controller = Controller::new(backend.tracer(), Arc::new(backend.clone()));
    (backend, controller)
}

#[test]
fn test_numeric_rule_prefers_exact_pid() {
    let (backend, _controller) = controller();
    let directory = ProcessDirectory::snapshot(&backend).unwrap();

    assert_eq!(directory.find_by_rule("1234").unwrap().id, 1234);
    // A name match alone would pick the other process
    assert_eq!(directory.find("1234").unwrap().id, 2000);
}

#[test]
fn test_process_command_starts_and_stops() {
    let (_backend, mut controller) = controller();

    let reply = controller.handle_message(r#"{"type":"process","rule":"my-app"}"#).unwrap();
    assert!(reply.is_none());
    assert_eq!(controller.tracer().pid(), Pid(3000));
    wait_for_state(controller.tracer(), SessionState::Running);

    // A rule that matches nothing stops tracing
    controller.handle_message(r#"{"type":"process","rule":"no-such-thing"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(0));
    assert_eq!(controller.tracer().state(), SessionState::Exited);

    controller.handle_message(r#"{"type":"process","rule":"1234"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(1234));

    // Missing rule means empty rule
    controller.handle_message(r#"{"type":"process"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(0));
}

#[test]
fn test_process_command_accepts_patterns() {
    let (_backend, mut controller) = controller();

    controller.handle_message(r#"{"type":"process","rule":"my-a.p$"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(3000));

    // First match by PID order
    controller.handle_message(r#"{"type":"process","rule":"^/(usr|opt)/"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(1234));

    controller.handle_message(r#"{"type":"process","rule":"worker-(\\d+)"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(2000));

    // Does not compile as a pattern, and no image name contains it
    controller.handle_message(r#"{"type":"process","rule":"(server"}"#).unwrap();
    assert_eq!(controller.tracer().pid(), Pid(0));
    assert_eq!(controller.tracer().state(), SessionState::Exited);
}

#[test]
fn test_thread_and_pause_commands() {
    let (_backend, mut controller) = controller();
    controller.retarget("1234");
    wait_for_state(controller.tracer(), SessionState::Running);

    controller.handle_message(r#"{"type":"thread","thread":1234}"#).unwrap();
    assert_eq!(controller.tracer().focus().0, 1234);

    assert_eq!(controller.dispatch(Command::Pause), None);
    assert_eq!(controller.tracer().state(), SessionState::Paused);
    controller.handle_message(r#"{"type":"pause"}"#).unwrap();
    assert_eq!(controller.tracer().state(), SessionState::Running);

    controller.shutdown();
    assert_eq!(controller.tracer().state(), SessionState::Exited);
}

#[test]
fn test_snapshot_reply_shape() {
    let (_backend, mut controller) = controller();
    controller.handle_message(r#"{"type":"thread","thread":1234}"#).unwrap();
    controller.retarget("1234");
    wait_for_samples(controller.tracer(), 2);

    let Some(Reply::Snapshot { data }) = controller.dispatch(Command::Snapshot) else {
        panic!("snapshot command must reply");
    };
    assert_eq!(data.process_id, 1234);
    assert_eq!(data.focus_thread_id, 1234);

    let json = controller.handle_message(r#"{"type":"snapshot"}"#).unwrap().expect("no reply");
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["type"], "snapshot");
    let data = &value["data"];
    assert_eq!(data["process_id"], 1234);
    assert_eq!(data["process_name"], "/usr/bin/server");
    assert!(data["sample_count"].as_u64().unwrap() >= 2);
    assert!(data["thread_summaries"].as_array().unwrap().len() == 2);
    assert!(data["inclusive_counts"].as_object().unwrap().contains_key("4112"));
    assert!(data.get("error").is_none());

    controller.shutdown();
}

#[test]
fn test_malformed_message_is_rejected() {
    let (_backend, mut controller) = controller();

    assert!(matches!(controller.handle_message("not json"), Err(ControlError::Malformed(_))));
    assert!(matches!(controller.handle_message(r#"{"type":"launch"}"#), Err(ControlError::Malformed(_))));
    assert_eq!(controller.tracer().state(), SessionState::Exited);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_headless_lines() {
    let (_backend, mut controller) = controller();
    let mut out = Vec::new();

    serve_line(&mut controller, r#"{"type":"process","rule":"server"}"#, &mut out).await.unwrap();
    serve_line(&mut controller, "garbage", &mut out).await.unwrap();
    serve_line(&mut controller, "", &mut out).await.unwrap();
    assert!(out.is_empty());

    serve_line(&mut controller, r#"{"type":"snapshot"}"#, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 1);
    let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(value["data"]["process_id"], 1234);

    controller.shutdown();
}
