//! Integration tests for `guest-exec` start and `guest-exec-status` polling.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;

use super::test_helpers::{request_json, MockPeer, Reply};
use qga_apikey::channel::ChannelClient;
use qga_apikey::models::GuestExecRequest;
use qga_apikey::orchestrator::ExecPoller;
use qga_apikey::AppError;

fn fast_poller(max_attempts: u32) -> ExecPoller {
    ExecPoller::new(Duration::from_millis(5), Duration::from_millis(20), max_attempts)
}

fn client_for(peer: &MockPeer) -> ChannelClient {
    ChannelClient::new(peer.path.clone(), Duration::from_secs(5))
}

#[tokio::test]
async fn polls_until_exited_and_decodes_output() {
    let out = STANDARD.encode("hello from guest\n");
    let peer = MockPeer::spawn(vec![
        Reply::line(r#"{"return": {"pid": 77}}"#),
        Reply::line(r#"{"return": {"exited": false}}"#),
        Reply::line(r#"{"return": {"exited": false}}"#),
        Reply::line(&format!(
            r#"{{"return": {{"exited": true, "exitcode": 0, "out-data": "{out}"}}}}"#
        )),
    ]);
    let client = client_for(&peer);

    let finished = fast_poller(5)
        .run(&client, &GuestExecRequest::captured("/bin/echo", vec!["hello".into()]))
        .await
        .expect("process finishes");

    assert_eq!(finished.outcome.pid, 77);
    assert_eq!(finished.outcome.exit_code, Some(0));
    assert_eq!(finished.outcome.stdout, "hello from guest\n");
    assert!(finished.raw_status.contains("\"exited\": true"));

    let requests = peer.requests().await;
    assert_eq!(requests.len(), 4);
    assert_eq!(request_json(&requests[0])["execute"], "guest-exec");
    for status_request in &requests[1..] {
        assert_eq!(
            request_json(status_request),
            json!({ "execute": "guest-exec-status", "arguments": { "pid": 77 } })
        );
    }
}

#[tokio::test]
async fn gives_up_after_attempt_budget() {
    let peer = MockPeer::spawn(vec![
        Reply::line(r#"{"return": {"pid": 9}}"#),
        Reply::line(r#"{"return": {"exited": false}}"#),
        Reply::line(r#"{"return": {"exited": false}}"#),
        Reply::line(r#"{"return": {"exited": false}}"#),
    ]);
    let client = client_for(&peer);

    let result = fast_poller(3)
        .run(&client, &GuestExecRequest::captured("/bin/sleep", vec!["60".into()]))
        .await;

    assert!(
        matches!(result, Err(AppError::OperationTimeout(ref msg)) if msg.contains("process 9")),
        "got {result:?}"
    );
    assert_eq!(peer.requests().await.len(), 4);
}

#[tokio::test]
async fn missing_out_data_yields_empty_stdout() {
    let peer = MockPeer::spawn(vec![Reply::line(r#"{"return": {"exited": true, "exitcode": 0}}"#)]);
    let client = client_for(&peer);

    let finished = fast_poller(1).wait(&client, 5).await.expect("finished");

    assert_eq!(finished.outcome.stdout, "");
    peer.requests().await;
}

#[tokio::test]
async fn start_surfaces_agent_error() {
    let peer = MockPeer::spawn(vec![Reply::line(
        r#"{"error": {"class": "GenericError", "desc": "Failed to execute child process"}}"#,
    )]);
    let client = client_for(&peer);

    let result = fast_poller(1)
        .start(&client, &GuestExecRequest::captured("/nope", Vec::new()))
        .await;

    assert!(matches!(result, Err(AppError::Operation(_))), "got {result:?}");
    peer.requests().await;
}

#[tokio::test]
async fn status_transport_failure_stops_polling() {
    let peer = MockPeer::spawn(vec![
        Reply::line(r#"{"return": {"pid": 3}}"#),
        Reply::Silent(Duration::from_secs(5)),
    ]);
    let client = ChannelClient::new(peer.path.clone(), Duration::from_millis(100));

    let result = fast_poller(5)
        .run(&client, &GuestExecRequest::captured("/bin/true", Vec::new()))
        .await;
    peer.abort();

    assert!(matches!(result, Err(AppError::Timeout(_))), "got {result:?}");
}
