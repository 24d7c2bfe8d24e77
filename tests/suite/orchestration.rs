//! Session turns driven end to end through a mocked Gemini backend

use std::sync::Arc;

use arkaios_engine::{
    DisplayRole, ImageAttachment, Session, SessionSettings, SubmitOutcome, TurnOutcome, TurnReport,
    Workspace,
};
use arkaios_providers::GeminiGateway;
use arkaios_tools::{ToolRegistry, ToolSettings};
use serde_json::json;

use crate::common::{
    PNG_BYTES, function_call_response, gemini_config, mount_json, mount_status, request_bodies,
    start_gemini_mock, text_response,
};

fn session_for(server: &wiremock::MockServer) -> Session {
    let gateway = GeminiGateway::new(gemini_config(server)).unwrap();
    let registry = ToolRegistry::with_builtins(ToolSettings::default()).unwrap();
    Session::new(Arc::new(gateway), registry, SessionSettings::default())
}

fn completed(outcome: SubmitOutcome) -> TurnReport {
    match outcome {
        SubmitOutcome::Completed(report) => report,
        other => panic!("expected a completed turn, got {other:?}"),
    }
}

#[tokio::test]
async fn write_file_chain_creates_file_and_reports_back() {
    let server = start_gemini_mock().await;
    mount_json(
        &server,
        function_call_response(
            "write_file",
            json!({ "fileName": "notes/todo.txt", "content": "hello" }),
        ),
        1,
    )
    .await;
    mount_json(&server, text_response("Saved your note."), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let session = session_for(&server);
    session.mount(Workspace::open(dir.path()).unwrap());

    let report = completed(session.submit("Save 'hello' to notes/todo.txt").await);

    assert_eq!(report.outcome, TurnOutcome::Completed);
    assert_eq!(report.rounds, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes/todo.txt")).unwrap(),
        "hello"
    );

    let roles: Vec<DisplayRole> = session.snapshot().iter().map(|m| m.role()).collect();
    assert_eq!(
        roles,
        vec![
            DisplayRole::User,
            DisplayRole::System,
            DisplayRole::Tool,
            DisplayRole::Model
        ]
    );

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    let contents = bodies[1]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["functionCall"]["name"], "write_file");
    let response = &contents[2]["parts"][0]["functionResponse"];
    assert_eq!(response["name"], "write_file");
    assert_eq!(
        response["response"]["result"],
        "Successfully wrote 5 bytes to notes/todo.txt"
    );
    let context = contents[0]["parts"][0]["text"].as_str().unwrap();
    assert!(context.ends_with("Current Task: Save 'hello' to notes/todo.txt"));
}

#[tokio::test]
async fn read_outside_workspace_is_reported_to_model() {
    let server = start_gemini_mock().await;
    mount_json(
        &server,
        function_call_response("read_file", json!({ "fileName": "../secret.txt" })),
        1,
    )
    .await;
    mount_json(&server, text_response("I cannot read that file."), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let session = session_for(&server);
    session.mount(Workspace::open(dir.path()).unwrap());

    let report = completed(session.submit("read ../secret.txt").await);
    assert_eq!(report.outcome, TurnOutcome::Completed);

    let snapshot = session.snapshot();
    let result = &snapshot[2].function_responses()[0];
    assert!(result.is_error);
    assert!(result.content.starts_with("Error executing read_file:"));

    let bodies = request_bodies(&server).await;
    let sent = bodies[1]["contents"][2]["parts"][0]["functionResponse"]["response"]["result"]
        .as_str()
        .unwrap();
    assert_eq!(sent, result.content);
}

#[tokio::test]
async fn backend_failure_becomes_system_entry() {
    let server = start_gemini_mock().await;
    mount_status(&server, 500, "internal").await;
    let session = session_for(&server);

    let report = completed(session.submit("hello").await);

    assert_eq!(report.outcome, TurnOutcome::GatewayFailed);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].role(), DisplayRole::System);
    assert!(snapshot[1].text().starts_with("Error connecting to model backend:"));
    assert!(!session.is_processing());
}

#[tokio::test]
async fn image_only_send_uses_default_prompt() {
    let server = start_gemini_mock().await;
    mount_json(&server, text_response("A code editor with a failing test."), 1).await;
    let session = session_for(&server);
    session.set_pending_image(ImageAttachment::from_png_bytes(PNG_BYTES).unwrap());

    completed(session.submit("").await);

    assert!(!session.has_pending_image());
    let body = &request_bodies(&server).await[0];
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert!(parts[0].get("inlineData").is_some());
    assert_eq!(parts[1]["text"], "Analyze this screen context.");
}

#[tokio::test]
async fn follow_up_turn_carries_recent_context() {
    let server = start_gemini_mock().await;
    mount_json(&server, text_response("Rust is a systems language."), 1).await;
    mount_json(&server, text_response("It was first released in 2015."), 1).await;
    let session = session_for(&server);
    session.greet();

    completed(session.submit("What is Rust?").await);
    completed(session.submit("When was it released?").await);

    let bodies = request_bodies(&server).await;
    let prompt = bodies[1]["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert_eq!(
        prompt,
        "Context:\n\
         model: Arkaios link initialized. System ready. Share a screen capture or ask a question.\n\
         user: What is Rust?\n\
         model: Rust is a systems language.\n\
         \n\
         Current Task: When was it released?"
    );
}
