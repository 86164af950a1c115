use std::time::Duration;

use assistant_relay::{
    api::AssistantApi,
    assistants::{messages::CreateMessageRequest, runs::Status},
    AssistantContext, Calculator, ChatSession, Credentials, OpenAiClient,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_json, body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

async fn setup() -> (MockServer, OpenAiClient) {
    let server = MockServer::start().await;
    let credentials = Credentials::new("sk-test", format!("{}/v1", server.uri()));
    let client = OpenAiClient::with_limits(credentials, Duration::from_secs(5), 1).unwrap();
    (server, client)
}

fn run_json(status: &str, required_action: Value) -> Value {
    json!({
        "id": "run_1",
        "object": "thread.run",
        "created_at": 1699063290,
        "assistant_id": "asst_1",
        "thread_id": "thread_1",
        "status": status,
        "required_action": required_action,
        "last_error": null,
        "model": "gpt-4o",
        "instructions": "You are a calculator.",
        "tools": []
    })
}

fn message_list_json(text: &str) -> Value {
    json!({
        "object": "list",
        "data": [{
            "id": "msg_2",
            "object": "thread.message",
            "created_at": 1699063291,
            "thread_id": "thread_1",
            "role": "assistant",
            "content": [{"type": "text", "text": {"value": text, "annotations": []}}],
            "assistant_id": "asst_1",
            "run_id": "run_1",
            "attachments": [],
            "metadata": {}
        }],
        "first_id": "msg_2",
        "last_id": "msg_2",
        "has_more": false
    })
}

#[tokio::test]
async fn create_thread_and_run_sends_seed_message() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/runs"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("OpenAI-Beta", "assistants=v2"))
        .and(body_json(json!({
            "assistant_id": "asst_1",
            "thread": {"messages": [{"role": "user", "content": "What is 2 + 3?"}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("queued", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    let handle = client
        .create_thread_and_run("asst_1", CreateMessageRequest::user("What is 2 + 3?", &[]))
        .await
        .unwrap();

    assert_eq!(handle.run_id, "run_1");
    assert_eq!(handle.thread_id, "thread_1");
}

#[tokio::test]
async fn chat_turn_dispatches_tool_calls() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("queued", Value::Null)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json(
            "requires_action",
            json!({
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {"tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "sum", "arguments": "{\"x\":2,\"y\":3}"}},
                    {"id": "call_2", "type": "function", "function": {"name": "unknown_fn", "arguments": "{}"}}
                ]}
            }),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/runs/run_1/submit_tool_outputs"))
        .and(body_json(json!({
            "tool_outputs": [
                {"tool_call_id": "call_1", "output": "5"},
                {"tool_call_id": "call_2", "output": "\"Function unknown_fn not found.\""}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("completed", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/messages"))
        .and(query_param("limit", "1"))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_list_json("2 + 3 = 5")))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = AssistantContext::new(client, Calculator, "asst_1")
        .with_poll_interval(Duration::from_millis(10));
    let mut session = ChatSession::new();
    let outcome = session.send(&ctx, "What is 2 + 3?").await.unwrap();

    assert_eq!(outcome.status, Status::Completed);
    assert_eq!(outcome.message.as_deref(), Some("2 + 3 = 5"));
    assert_eq!(outcome.first_tool_return_value(), Some(&json!(5)));
    assert_eq!(session.thread_id(), Some("thread_1"));
}

#[tokio::test]
async fn continuing_a_thread_appends_then_runs() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/messages"))
        .and(body_partial_json(json!({"role": "user", "content": "And 4 + 4?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_3",
            "object": "thread.message",
            "created_at": 1699063292,
            "thread_id": "thread_1",
            "role": "user",
            "content": [{"type": "text", "text": {"value": "And 4 + 4?", "annotations": []}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/runs"))
        .and(body_json(json!({"assistant_id": "asst_1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("queued", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = AssistantContext::new(client, Calculator, "asst_1");
    let handle = ctx
        .start_or_continue("And 4 + 4?", &[], Some("thread_1"))
        .await
        .unwrap();

    assert_eq!(handle.thread_id, "thread_1");
}

#[tokio::test]
async fn api_error_envelope_is_returned() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_x/runs/run_x"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "message": "No thread found with id 'thread_x'.",
                "type": "invalid_request_error",
                "param": null,
                "code": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = AssistantApi::get_run(&client, "thread_x", "run_x")
        .await
        .unwrap_err();

    assert_eq!(error.error_type, "invalid_request_error");
    assert_eq!(error.message, "No thread found with id 'thread_x'.");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream hiccup"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("in_progress", Value::Null)))
        .with_priority(2)
        .mount(&server)
        .await;

    let run = AssistantApi::get_run(&client, "thread_1", "run_1").await.unwrap();

    assert_eq!(run.status, Status::InProgress);
}

fn idempotency_keys(requests: &[wiremock::Request], route: &str) -> Vec<String> {
    requests
        .iter()
        .filter(|request| request.url.path() == route)
        .map(|request| {
            request
                .headers
                .get("idempotency-key")
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[tokio::test]
async fn timed_out_append_is_retried_with_same_idempotency_key() {
    let server = MockServer::start().await;
    let credentials = Credentials::new("sk-test", format!("{}/v1", server.uri()));
    let client =
        OpenAiClient::with_limits(credentials, Duration::from_millis(200), 1).unwrap();

    let message = json!({
        "id": "msg_3",
        "object": "thread.message",
        "created_at": 1699063292,
        "thread_id": "thread_1",
        "role": "user",
        "content": [{"type": "text", "text": {"value": "hi", "annotations": []}}]
    });
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(message.clone())
                .set_delay(Duration::from_millis(600)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_1/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("queued", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = AssistantContext::new(client, Calculator, "asst_1");
    let handle = ctx.start_or_continue("hi", &[], Some("thread_1")).await;
    assert_eq!(handle.map(|handle| handle.run_id).as_deref(), Some("run_1"));

    let requests = server.received_requests().await.unwrap();
    let append_keys = idempotency_keys(&requests, "/v1/threads/thread_1/messages");
    let run_keys = idempotency_keys(&requests, "/v1/threads/thread_1/runs");

    assert_eq!(append_keys.len(), 2);
    assert!(!append_keys[0].is_empty());
    assert_eq!(append_keys[0], append_keys[1]);
    assert_eq!(run_keys.len(), 1);
    assert_ne!(run_keys[0], append_keys[0]);
}

#[tokio::test]
async fn status_fetches_carry_no_idempotency_key() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("in_progress", Value::Null)))
        .expect(1)
        .mount(&server)
        .await;

    AssistantApi::get_run(&client, "thread_1", "run_1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("idempotency-key").is_none());
}

#[tokio::test]
async fn failed_poll_yields_nothing() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let ctx = AssistantContext::new(client, Calculator, "asst_1");
    let handle = assistant_relay::api::RunHandle {
        run_id: "run_1".to_string(),
        thread_id: "thread_1".to_string(),
    };

    assert_eq!(ctx.poll(&handle).await, None);
}

#[tokio::test]
async fn upload_returns_file_id() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/v1/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-abc123",
            "object": "file",
            "bytes": 4,
            "created_at": 1699063290,
            "filename": "notes.txt",
            "purpose": "assistants"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file_id = AssistantApi::upload_file(&client, "notes.txt", b"2+3?".to_vec())
        .await
        .unwrap();

    assert_eq!(file_id, "file-abc123");
}
