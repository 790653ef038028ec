//! Model and config command tests against the scripted daemon

use std::sync::Arc;

use ollama_manager_cli::{
    commands::{config::ConfigCommand, models::ModelsCommand, AppContext, Command},
    error::CliError,
    router::{ConfigSubcommand, ModelsSubcommand},
};
use ollama_manager_client::{scripted::ScriptedDaemon, DaemonError, ModelTag, PullEvent};
use ollama_manager_config::{settings, ManagerConfig, DEFAULT_HOST};
use ollama_manager_models::ErrorKind;
use serial_test::serial;
use tempfile::TempDir;

fn context(models: &[&str]) -> (ScriptedDaemon, AppContext) {
    let daemon = ScriptedDaemon::with_models(
        models
            .iter()
            .map(|name| ModelTag::new(*name, 3_000_000_000))
            .collect(),
    );
    let ctx = AppContext::with_daemon(ManagerConfig::default(), Arc::new(daemon.clone()));
    (daemon, ctx)
}

async fn run(ctx: &AppContext, action: ModelsSubcommand) -> Result<(), CliError> {
    ModelsCommand::new(ctx.clone(), action).execute().await
}

#[tokio::test]
async fn test_list_refreshes_snapshot() {
    let (_daemon, ctx) = context(&["llama3:latest", "mistral:7b"]);

    run(&ctx, ModelsSubcommand::list()).await.unwrap();
    assert_eq!(ctx.registry.snapshot().len(), 2);

    let json = ModelsSubcommand::List {
        search: Some("mistral".into()),
        sort: Default::default(),
        desc: false,
        json: true,
    };
    run(&ctx, json).await.unwrap();
}

#[tokio::test]
async fn test_list_reports_unreachable_daemon() {
    let (daemon, ctx) = context(&["llama3:latest"]);
    daemon.set_unreachable(true);

    let err = run(&ctx, ModelsSubcommand::list()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::UnreachableDaemon));
}

#[tokio::test]
async fn test_pull_installs_model() {
    let (daemon, ctx) = context(&[]);
    daemon.script_pull(
        "phi3:latest",
        vec![
            Ok(PullEvent::status("pulling manifest")),
            Ok(PullEvent::layer("sha256:1111", 2_000_000_000, 2_000_000_000)),
            Ok(PullEvent::status("success")),
        ],
    );

    run(&ctx, ModelsSubcommand::Pull { name: "phi3".into() })
        .await
        .unwrap();

    assert_eq!(daemon.installed(), vec!["phi3:latest".to_string()]);
    assert!(ctx.registry.find("phi3").is_some());
}

#[tokio::test]
async fn test_pull_failure_is_an_error() {
    let (daemon, ctx) = context(&[]);
    daemon.script_pull(
        "nosuch:latest",
        vec![Err(DaemonError::Remote(
            "pull model manifest: file does not exist".into(),
        ))],
    );

    let err = run(&ctx, ModelsSubcommand::Pull { name: "nosuch".into() })
        .await
        .unwrap_err();
    match err {
        CliError::PullFailed { model, message } => {
            assert_eq!(model, "nosuch:latest");
            assert_eq!(message, "pull model manifest: file does not exist");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_update_requires_installed_model() {
    let (_daemon, ctx) = context(&["llama3:latest"]);

    let err = run(&ctx, ModelsSubcommand::Update { name: "phi3".into() })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_delete_with_yes() {
    let (daemon, ctx) = context(&["llama3:latest", "mistral:7b"]);

    run(
        &ctx,
        ModelsSubcommand::Delete {
            name: "llama3".into(),
            yes: true,
        },
    )
    .await
    .unwrap();

    assert_eq!(daemon.deleted(), vec!["llama3:latest".to_string()]);
    assert!(ctx.registry.find("llama3:latest").is_none());
    assert!(ctx.registry.find("mistral:7b").is_some());
}

#[tokio::test]
async fn test_delete_unknown_model_touches_nothing() {
    let (daemon, ctx) = context(&["mistral:7b"]);

    let err = run(
        &ctx,
        ModelsSubcommand::Delete {
            name: "llama3".into(),
            yes: true,
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert!(daemon.deleted().is_empty());
    assert_eq!(ctx.registry.snapshot().len(), 1);
}

#[tokio::test]
async fn test_show_and_usage() {
    let (_daemon, ctx) = context(&["llama3:latest"]);

    run(&ctx, ModelsSubcommand::Show { name: "llama3".into(), json: false })
        .await
        .unwrap();
    run(&ctx, ModelsSubcommand::Show { name: "llama3".into(), json: true })
        .await
        .unwrap();
    run(&ctx, ModelsSubcommand::Usage).await.unwrap();

    let err = run(&ctx, ModelsSubcommand::Show { name: "phi3".into(), json: false })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
#[serial]
async fn test_set_host_persists_to_global_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.yaml");

    ConfigCommand::new(
        ConfigSubcommand::SetHost {
            url: "gpu-box:11434".into(),
        },
        ManagerConfig::default(),
    )
    .with_global_path(&path)
    .execute()
    .await
    .unwrap();

    let mut saved = ManagerConfig::default();
    saved.merge_from_file(&path).unwrap();
    assert_eq!(saved.host, "http://gpu-box:11434");
    assert_eq!(settings().host(), "http://gpu-box:11434");

    settings().set_host(DEFAULT_HOST).unwrap();
}

#[tokio::test]
#[serial]
async fn test_set_host_rejects_invalid_url() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    let before = settings().host();

    let err = ConfigCommand::new(
        ConfigSubcommand::SetHost {
            url: "ftp://gpu-box".into(),
        },
        ManagerConfig::default(),
    )
    .with_global_path(&path)
    .execute()
    .await
    .unwrap_err();

    assert!(matches!(err, CliError::Config(_)));
    assert!(!path.exists());
    assert_eq!(settings().host(), before);
}

#[tokio::test]
async fn test_config_show() {
    let dir = TempDir::new().unwrap();
    ConfigCommand::new(ConfigSubcommand::Show, ManagerConfig::default())
        .with_global_path(dir.path().join("config.yaml"))
        .execute()
        .await
        .unwrap();
}
