//! End-to-end tests for a memory turn over HTTP
//!
//! Runs the pipeline with the real `ModelClient` and `RemoteStore` against
//! mock servers standing in for the chat-completion endpoint and the memory
//! service:
//! - Turn -> Extraction -> Query -> Consolidation -> Add/Delete

use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use memfold::config::{Config, MemoryConfig, ModelConfig, StoreConfig};
use memfold::pipeline::{ChatMessage, FactOutcome, MemoryPipeline, Stage, TurnState};
use memfold::storage::RemoteStore;
use memfold::{ChannelSink, NoopSink, UserContext, UserId};

// =============================================================================
// Test Fixtures and Helpers
// =============================================================================

const EXTRACTION_MARKER: &str = "You are a memory extractor";
const CONSOLIDATION_MARKER: &str = "You maintain a list of facts";

fn user() -> UserContext {
    UserContext::new(UserId::try_from("user-42").unwrap())
}

fn config(model_server: &MockServer, store_server: &MockServer) -> Config {
    Config {
        model: ModelConfig {
            endpoint_url: model_server.uri(),
            api_key: "test-key".to_string(),
            ..ModelConfig::default()
        },
        memory: MemoryConfig::default(),
        store: StoreConfig {
            base_url: store_server.uri(),
            api_key_env: "MEMFOLD_TEST_STORE_TOKEN_UNSET".to_string(),
            timeout_secs: 5,
        },
    }
}

fn build_pipeline(config: &Config) -> MemoryPipeline {
    let store = Arc::new(RemoteStore::new(&config.store).unwrap());
    MemoryPipeline::from_config(config, store).unwrap()
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
}

async fn mount_model_reply(server: &MockServer, marker: &str, content: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_string_contains(marker))
        .respond_with(completion(content))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_add(server: &MockServer, content: &str, id: &str) {
    Mock::given(method("POST"))
        .and(path("/users/user-42/memories"))
        .and(body_json(json!({"content": content})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "content": content,
            "created_at": 1700000000
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_query(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/users/user-42/memories/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

// =============================================================================
// Full Turn Tests
// =============================================================================

#[tokio::test]
async fn test_turn_with_no_related_memories() {
    let model_server = MockServer::start().await;
    let store_server = MockServer::start().await;

    mount_model_reply(
        &model_server,
        EXTRACTION_MARKER,
        r#"["User has a cat named Miso"]"#,
        1,
    )
    .await;
    mount_model_reply(&model_server, CONSOLIDATION_MARKER, "[]", 0).await;
    // The memory service answers "no match" with null
    mount_query(&store_server, Value::Null).await;
    mount_add(&store_server, "User has a cat named Miso", "mem-1").await;

    let pipeline = build_pipeline(&config(&model_server, &store_server));
    let messages = vec![
        ChatMessage::user("I just adopted a cat named Miso"),
        ChatMessage::assistant("Congratulations!"),
    ];
    let report = pipeline.process_turn(&user(), &messages, &NoopSink).await;

    assert_eq!(report.state, TurnState::Done);
    let added = report.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].id.as_str(), "mem-1");
    assert!(report.deleted().is_empty());
}

#[tokio::test]
async fn test_turn_merges_and_replaces_related_memory() {
    let model_server = MockServer::start().await;
    let store_server = MockServer::start().await;

    mount_model_reply(
        &model_server,
        EXTRACTION_MARKER,
        r#"["User likes ripe oranges"]"#,
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains(CONSOLIDATION_MARKER))
        .and(body_string_contains("1970-01-01T00:16:40Z"))
        .respond_with(completion(r#"["User likes ripe oranges"]"#))
        .expect(1)
        .mount(&model_server)
        .await;

    mount_query(
        &store_server,
        json!({
            "ids": [["orange-id", "pineapple-id"]],
            "documents": [["User likes oranges", "User likes pineapples"]],
            "metadatas": [[{"created_at": 1000}, {"created_at": 900}]],
            "distances": [[0.2, 0.9]]
        }),
    )
    .await;
    mount_add(&store_server, "User likes ripe oranges", "mem-2").await;
    Mock::given(method("DELETE"))
        .and(path("/users/user-42/memories/orange-id"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&store_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/user-42/memories/pineapple-id"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&store_server)
        .await;

    let pipeline = build_pipeline(&config(&model_server, &store_server));
    let (sink, mut rx) = ChannelSink::new();
    let messages = vec![
        ChatMessage::user("Ripe oranges are the best"),
        ChatMessage::assistant("They really are."),
    ];
    let report = pipeline.process_turn(&user(), &messages, &sink).await;

    assert_eq!(report.state, TurnState::Done);
    assert_eq!(report.deleted().len(), 1);
    assert_eq!(report.deleted()[0].as_str(), "orange-id");

    let event = rx.try_recv().unwrap();
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        json!({
            "type": "status",
            "data": {
                "description": "Memory updated: User likes ripe oranges (replaced 1)",
                "done": true
            }
        })
    );
}

#[tokio::test]
async fn test_model_failure_reports_extraction_stage() {
    let model_server = MockServer::start().await;
    let store_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal error"))
        .expect(1)
        .mount(&model_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&store_server)
        .await;

    let pipeline = build_pipeline(&config(&model_server, &store_server));
    let messages = vec![
        ChatMessage::user("I moved to Lisbon"),
        ChatMessage::assistant("Welcome!"),
    ];
    let report = pipeline.process_turn(&user(), &messages, &NoopSink).await;

    assert_eq!(report.state, TurnState::PartialFailure);
    assert!(matches!(
        &report.outcomes[0],
        FactOutcome::Failed { stage: Stage::Extraction, error, .. } if error.contains("500")
    ));

    assert!(pipeline.shutdown().await);
    assert!(!pipeline.shutdown().await);
}
