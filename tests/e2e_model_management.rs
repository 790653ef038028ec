//! End-to-end model management: registry over the HTTP client against a
//! mocked daemon

use std::sync::Arc;

use mockito::{Matcher, Server};
use ollama_manager_cli::{
    commands::{models::ModelsCommand, AppContext, Command},
    router::ModelsSubcommand,
};
use ollama_manager_client::OllamaClient;
use ollama_manager_config::ManagerConfig;
use ollama_manager_integration_tests::{error_line, pull_body, tags_body};
use ollama_manager_models::{ErrorKind, ModelRegistry, PullStatus};

const GB: u64 = 1_000_000_000;

fn config_for(url: String) -> ManagerConfig {
    ManagerConfig {
        host: url,
        max_retries: 0,
        ..ManagerConfig::default()
    }
}

fn registry_for(url: String) -> ModelRegistry {
    let client = OllamaClient::from_config(&config_for(url)).unwrap();
    ModelRegistry::new(Arc::new(client))
}

#[tokio::test]
async fn test_delete_removes_model_from_later_lists() {
    let mut server = Server::new_async().await;
    let tags = server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[("llama3:8b", 4_700_000_000)]))
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/delete")
        .match_body(Matcher::PartialJsonString(
            r#"{"model": "llama3:8b"}"#.to_string(),
        ))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let registry = registry_for(server.url());
    registry.list().await.unwrap();
    assert!(registry.find("llama3:8b").is_some());

    registry.delete("llama3:8b").await.unwrap();
    assert!(registry.find("llama3:8b").is_none());
    delete.assert_async().await;

    tags.remove_async().await;
    server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[]))
        .create_async()
        .await;

    let records = registry.list().await.unwrap();
    assert!(records.iter().all(|r| r.name != "llama3:8b"));
}

#[tokio::test]
async fn test_unknown_identifier_never_reaches_daemon() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[("mistral:7b", 4 * GB)]))
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/api/delete")
        .expect(0)
        .create_async()
        .await;
    let show = server
        .mock("POST", "/api/show")
        .expect(0)
        .create_async()
        .await;

    let registry = registry_for(server.url());
    registry.list().await.unwrap();
    let before = registry.snapshot();

    let err = registry.delete("llama3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = registry.details("llama3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(*registry.snapshot(), *before);
    delete.assert_async().await;
    show.assert_async().await;
}

#[tokio::test]
async fn test_daemon_side_delete_failure_keeps_record() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[("llama3:latest", 4 * GB)]))
        .create_async()
        .await;
    server
        .mock("DELETE", "/api/delete")
        .with_status(404)
        .with_body(error_line("model 'llama3:latest' not found"))
        .create_async()
        .await;

    let registry = registry_for(server.url());
    registry.list().await.unwrap();

    let err = registry.delete("llama3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(registry.find("llama3:latest").is_some());
}

#[tokio::test]
async fn test_completed_pull_appears_in_list() {
    let mut server = Server::new_async().await;
    let pull = server
        .mock("POST", "/api/pull")
        .match_body(Matcher::PartialJsonString(
            r#"{"model": "phi3:latest"}"#.to_string(),
        ))
        .with_body(pull_body(&[("sha256:aaaa", 2 * GB), ("sha256:bbbb", 1_000)]))
        .create_async()
        .await;
    server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[("phi3:latest", 2 * GB + 1_000)]))
        .create_async()
        .await;

    let registry = registry_for(server.url());
    let handle = registry.pull("phi3").unwrap();
    assert_eq!(handle.identifier(), "phi3:latest");

    let job = handle.wait().await;
    assert_eq!(job.status, PullStatus::Complete);
    assert_eq!(job.completed, 2 * GB + 1_000);
    assert_eq!(job.total, 2 * GB + 1_000);
    assert_eq!(job.layer_count(), 2);

    // Completion is only published once the snapshot has the model
    assert!(registry.find("phi3").is_some());
    let records = registry.list().await.unwrap();
    assert!(records.iter().any(|r| r.name == "phi3:latest"));
    pull.assert_async().await;
}

#[tokio::test]
async fn test_pull_error_event_fails_job() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/pull")
        .with_body(error_line("pull model manifest: file does not exist"))
        .create_async()
        .await;

    let registry = registry_for(server.url());
    let job = registry.pull("nosuch").unwrap().wait().await;

    assert_eq!(job.status, PullStatus::Failed);
    assert_eq!(
        job.error.as_deref(),
        Some("pull model manifest: file does not exist")
    );
    assert!(registry.snapshot().is_empty());

    // A failed job can be retried
    assert!(registry.pull("nosuch").is_ok());
}

#[tokio::test]
async fn test_unreachable_daemon_keeps_snapshot() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[("llama3:latest", 4 * GB)]))
        .create_async()
        .await;

    let registry = registry_for(server.url());
    registry.list().await.unwrap();

    let offline = registry_for("http://127.0.0.1:1".to_string());
    let err = offline.list().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnreachableDaemon);
    assert!(err.is_retryable());
    assert!(offline.snapshot().fetched_at.is_none());
    assert_eq!(registry.snapshot().len(), 1);
}

#[tokio::test]
async fn test_models_commands_over_http() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_body(tags_body(&[("llama3:latest", 4 * GB), ("mistral:7b", 4 * GB)]))
        .create_async()
        .await;
    server
        .mock("POST", "/api/show")
        .with_body(
            r#"{"license": "META LLAMA 3 COMMUNITY LICENSE", "parameters": "num_ctx 8192",
                "details": {"family": "llama", "parameter_size": "8.0B"},
                "model_info": {"llama.context_length": 8192}}"#,
        )
        .create_async()
        .await;

    let config = config_for(server.url());
    let client = OllamaClient::from_config(&config).unwrap();
    let ctx = AppContext::with_daemon(config, Arc::new(client));

    ModelsCommand::new(ctx.clone(), ModelsSubcommand::list())
        .execute()
        .await
        .unwrap();
    ModelsCommand::new(
        ctx.clone(),
        ModelsSubcommand::Show {
            name: "llama3".into(),
            json: false,
        },
    )
    .execute()
    .await
    .unwrap();

    let details = ctx.registry.details("llama3").await.unwrap();
    assert_eq!(details.context_length(), Some(8192));
    assert_eq!(details.record.parameter_size, "8.0B");
}
