// Configuration commands

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ollama_manager_config::{
    config::{normalize_host, validate_host},
    settings, ManagerConfig,
};

use crate::{
    commands::Command,
    error::{CliError, CliResult},
    output::OutputStyle,
    router::ConfigSubcommand,
};

/// View or change configuration
pub struct ConfigCommand {
    action: ConfigSubcommand,
    config: ManagerConfig,
    global_path: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn new(action: ConfigSubcommand, config: ManagerConfig) -> Self {
        Self {
            action,
            config,
            global_path: ManagerConfig::global_config_path(),
        }
    }

    /// Write the global config to `path` instead of the home directory
    pub fn with_global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    fn show(&self) -> CliResult<()> {
        let style = OutputStyle::default();
        let rendered =
            serde_yaml::to_string(&self.config).map_err(|e| CliError::Internal(e.to_string()))?;

        println!("{}", style.section("Configuration"));
        println!("{}", rendered.trim_end());
        println!("{}", style.section("Files"));
        if let Some(global) = &self.global_path {
            println!("{}", style.key_value("Global", &describe(global)));
        }
        println!(
            "{}",
            style.key_value("Project", &describe(&ManagerConfig::project_config_path()))
        );
        Ok(())
    }

    fn set_host(&self, url: &str) -> CliResult<()> {
        let host = normalize_host(url);
        validate_host(&host)?;

        let path = self.global_path.clone().ok_or_else(|| {
            CliError::InvalidArgument {
                message: "cannot determine the home directory".to_string(),
            }
        })?;

        let mut stored = ManagerConfig::default();
        if path.exists() {
            stored.merge_from_file(&path)?;
        }
        stored.host = host.clone();
        stored.save_to(&path)?;
        settings().set_host(&host)?;

        println!(
            "{}",
            OutputStyle::default().success(&format!("Ollama host set to {}", host))
        );
        Ok(())
    }
}

#[async_trait]
impl Command for ConfigCommand {
    async fn execute(&self) -> CliResult<()> {
        match &self.action {
            ConfigSubcommand::Show => self.show(),
            ConfigSubcommand::SetHost { url } => self.set_host(url),
        }
    }
}

fn describe(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not present)", path.display())
    }
}
