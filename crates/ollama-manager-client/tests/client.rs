//! OllamaClient against a mocked daemon

use futures::StreamExt;
use ollama_manager_client::{
    ChatMessage, ChatOptions, ChatRequest, Daemon, DaemonError, OllamaClient,
};
use ollama_manager_config::{settings, ManagerConfig};
use serial_test::serial;

fn client_for(url: String) -> OllamaClient {
    let config = ManagerConfig {
        host: url,
        max_retries: 0,
        ..ManagerConfig::default()
    };
    OllamaClient::from_config(&config).unwrap()
}

fn chat_request(model: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::new("user", "Hello")],
        stream: true,
        options: ChatOptions::default(),
    }
}

#[tokio::test]
async fn test_list_models_parses_tags() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
            "models": [
                {
                    "name": "llama3:latest",
                    "model": "llama3:latest",
                    "modified_at": "2024-05-01T10:00:00Z",
                    "size": 4661224676,
                    "digest": "365c0bd3c000",
                    "details": {
                        "format": "gguf",
                        "family": "llama",
                        "parameter_size": "8.0B",
                        "quantization_level": "Q4_0"
                    }
                },
                {
                    "name": "mistral:7b",
                    "modified_at": "2024-04-01T10:00:00Z",
                    "size": 4109865159
                }
            ]
        }"#,
        )
        .create_async()
        .await;

    let client = client_for(server.url());
    let models = client.list_models().await.unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "llama3:latest");
    assert_eq!(models[0].size, 4661224676);
    assert_eq!(models[0].details.family, "llama");
    assert_eq!(models[0].details.parameter_size, "8.0B");
    assert_eq!(models[1].name, "mistral:7b");
    assert!(models[1].digest.is_empty());
}

#[tokio::test]
async fn test_list_models_empty_body() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(r#"{"models": []}"#)
        .create_async()
        .await;

    let client = client_for(server.url());
    assert!(client.list_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_models_malformed_body() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client.list_models().await.unwrap_err();
    assert!(matches!(err, DaemonError::Malformed(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_list_models_server_error_is_retryable() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(500)
        .with_body(r#"{"error": "internal failure"}"#)
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client.list_models().await.unwrap_err();
    match &err {
        DaemonError::Http { status, message } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "internal failure");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_idempotent_request_retried_after_server_error() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/tags")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let config = ManagerConfig {
        host: server.url(),
        max_retries: 2,
        ..ManagerConfig::default()
    };
    let client = OllamaClient::from_config(&config).unwrap();

    assert!(client.list_models().await.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host() {
    let client = client_for("http://127.0.0.1:1".to_string());

    let err = client.list_models().await.unwrap_err();
    assert!(matches!(err, DaemonError::Unreachable { .. }));
    assert!(err.is_retryable());
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn test_show_model() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/show")
        .match_body(mockito::Matcher::JsonString(
            r#"{"model": "llama3:latest"}"#.to_string(),
        ))
        .with_status(200)
        .with_body(
            r#"{
            "license": "META LLAMA 3 COMMUNITY LICENSE",
            "modelfile": "FROM llama3",
            "parameters": "stop \"<|eot_id|>\"",
            "template": "{{ .Prompt }}",
            "details": {"family": "llama", "parameter_size": "8.0B", "quantization_level": "Q4_0"},
            "model_info": {"llama.context_length": 8192}
        }"#,
        )
        .create_async()
        .await;

    let client = client_for(server.url());
    let show = client.show_model("llama3:latest").await.unwrap();

    assert!(show.license.starts_with("META LLAMA 3"));
    assert_eq!(show.details.quantization_level, "Q4_0");
    let info = show.model_info.unwrap();
    assert_eq!(info["llama.context_length"], 8192);
}

#[tokio::test]
async fn test_delete_unknown_model_is_not_found() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("DELETE", "/api/delete")
        .with_status(404)
        .with_body(r#"{"error": "model 'ghost:latest' not found"}"#)
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client.delete_model("ghost:latest").await.unwrap_err();
    assert_eq!(err, DaemonError::NotFound("ghost:latest".to_string()));
}

#[tokio::test]
async fn test_delete_model() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("DELETE", "/api/delete")
        .match_body(mockito::Matcher::JsonString(
            r#"{"model": "mistral:7b"}"#.to_string(),
        ))
        .with_status(200)
        .create_async()
        .await;

    let client = client_for(server.url());
    client.delete_model("mistral:7b").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_name_rejected_without_request() {
    let client = client_for("http://127.0.0.1:1".to_string());

    assert!(matches!(
        client.delete_model("  ").await,
        Err(DaemonError::InvalidRequest(_))
    ));
    assert!(matches!(
        client.pull_model("").await,
        Err(DaemonError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_pull_streams_progress() {
    let mut server = mockito::Server::new_async().await;

    let body = concat!(
        r#"{"status":"pulling manifest"}"#,
        "\n",
        r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":1000,"completed":250}"#,
        "\n",
        r#"{"status":"pulling 6a0746a1ec1a","digest":"sha256:6a0746a1ec1a","total":1000,"completed":1000}"#,
        "\n",
        r#"{"status":"verifying sha256 digest"}"#,
        "\n",
        r#"{"status":"writing manifest"}"#,
        "\n",
        r#"{"status":"success"}"#,
        "\n",
    );

    let _mock = server
        .mock("POST", "/api/pull")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model": "llama3:latest", "stream": true}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(server.url());
    let events: Vec<_> = client
        .pull_model("llama3:latest")
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 6);
    let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
    assert_eq!(events[0].status, "pulling manifest");
    assert_eq!(events[1].completed, Some(250));
    assert_eq!(events[2].total, Some(1000));
    assert!(events[5].is_success());
}

#[tokio::test]
async fn test_pull_error_event() {
    let mut server = mockito::Server::new_async().await;

    let body = concat!(
        r#"{"status":"pulling manifest"}"#,
        "\n",
        r#"{"error":"pull model manifest: file does not exist"}"#,
        "\n",
    );

    let _mock = server
        .mock("POST", "/api/pull")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(server.url());
    let events: Vec<_> = client
        .pull_model("no-such-model")
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(events[0].is_ok());
    assert_eq!(
        events[1],
        Err(DaemonError::Remote(
            "pull model manifest: file does not exist".to_string()
        ))
    );
}

#[tokio::test]
async fn test_chat_streams_chunks() {
    let mut server = mockito::Server::new_async().await;

    let body = concat!(
        r#"{"model":"llama3","message":{"role":"assistant","content":"Hel"},"done":false}"#,
        "\n",
        r#"{"model":"llama3","message":{"role":"assistant","content":"lo!"},"done":false}"#,
        "\n",
        r#"{"model":"llama3","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#,
        "\n",
    );

    let _mock = server
        .mock("POST", "/api/chat")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model": "llama3:latest", "stream": true}"#.to_string(),
        ))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(server.url());
    let chunks: Vec<_> = client
        .chat(chat_request("llama3:latest"))
        .await
        .unwrap()
        .map(|c| c.unwrap())
        .collect()
        .await;

    let text: String = chunks.iter().map(|c| c.text()).collect();
    assert_eq!(text, "Hello!");
    assert!(chunks.last().unwrap().done);
    assert_eq!(chunks.last().unwrap().done_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_chat_sends_sampling_options() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/chat")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"options": {"temperature": 0.5, "top_k": 40, "num_ctx": 2048}}"#.to_string(),
        ))
        .with_status(200)
        .with_body("{\"message\":{\"role\":\"assistant\",\"content\":\"ok\"},\"done\":true}\n")
        .create_async()
        .await;

    let mut request = chat_request("llama3:latest");
    request.options = ChatOptions {
        temperature: Some(0.5),
        top_k: Some(40),
        num_ctx: Some(2048),
        ..ChatOptions::default()
    };

    let client = client_for(server.url());
    let chunks: Vec<_> = client.chat(request).await.unwrap().collect().await;
    assert_eq!(chunks.len(), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_chat_unknown_model() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(404)
        .with_body(r#"{"error": "model 'ghost' not found, try pulling it first"}"#)
        .create_async()
        .await;

    let client = client_for(server.url());
    let err = client.chat(chat_request("ghost")).await.err().unwrap();
    assert_eq!(err, DaemonError::NotFound("ghost".to_string()));
}

#[tokio::test]
async fn test_version_and_health_check() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/version")
        .with_status(200)
        .with_body(r#"{"version": "0.1.32"}"#)
        .create_async()
        .await;

    let client = client_for(server.url());
    assert_eq!(client.version().await.unwrap(), "0.1.32");
    assert!(client.health_check().await);
}

#[tokio::test]
#[serial]
async fn test_settings_client_follows_host_changes() {
    let mut first = mockito::Server::new_async().await;
    let mut second = mockito::Server::new_async().await;

    let _first = first
        .mock("GET", "/api/version")
        .with_status(200)
        .with_body(r#"{"version": "1.0.0"}"#)
        .create_async()
        .await;
    let _second = second
        .mock("GET", "/api/version")
        .with_status(200)
        .with_body(r#"{"version": "2.0.0"}"#)
        .create_async()
        .await;

    let previous = settings().snapshot();
    settings().set_host(&first.url()).unwrap();

    let client = OllamaClient::from_settings().unwrap();
    assert_eq!(client.version().await.unwrap(), "1.0.0");

    settings().set_host(&second.url()).unwrap();
    assert_eq!(client.base_url(), second.url());
    assert_eq!(client.version().await.unwrap(), "2.0.0");

    settings().replace(previous);
}
