// Model management commands

use std::io::Write;

use async_trait::async_trait;
use indicatif::ProgressBar;
use ollama_manager_models::{ModelDetails, PullHandle, PullJob, PullStatus, RegistryError};
use tracing::{debug, info};

use crate::{
    commands::{AppContext, Command},
    error::{CliError, CliResult},
    logging::VerbosityLevel,
    output::{format_size, print_info, print_warning, OutputStyle},
    progress::{create_pull_bar, create_spinner, update_pull_bar},
    router::ModelsSubcommand,
};

/// List, pull, update, delete and inspect installed models
pub struct ModelsCommand {
    ctx: AppContext,
    action: ModelsSubcommand,
}

impl ModelsCommand {
    pub fn new(ctx: AppContext, action: ModelsSubcommand) -> Self {
        Self { ctx, action }
    }

    async fn refresh(&self) -> CliResult<()> {
        let spinner = if VerbosityLevel::Normal.should_output() && atty::is(atty::Stream::Stderr) {
            Some(create_spinner("Fetching installed models..."))
        } else {
            None
        };
        let result = self.ctx.registry.list().await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        result?;
        Ok(())
    }

    async fn list(&self, json: bool) -> CliResult<()> {
        self.refresh().await?;

        let query = self.action.query().unwrap_or_default();
        let records = self.ctx.registry.query(&query);

        if json {
            let rendered = serde_json::to_string_pretty(&records)
                .map_err(|e| CliError::Internal(e.to_string()))?;
            println!("{}", rendered);
            return Ok(());
        }

        let style = OutputStyle::default();
        if records.is_empty() {
            if self.ctx.registry.snapshot().is_empty() {
                print_info("No models installed. Pull one with 'olm models pull <name>'.");
            } else {
                print_info("No installed model matches the search.");
            }
            return Ok(());
        }

        println!(
            "{}",
            style.model_table(&records, Some(&self.ctx.config.default_model))
        );
        println!();
        println!("{}", style.usage_summary(&self.ctx.registry.disk_usage()));
        Ok(())
    }

    async fn pull(&self, name: &str) -> CliResult<()> {
        let handle = self.ctx.registry.pull(name)?;
        info!("Pulling {}", handle.identifier());
        follow_pull(handle).await.map(|_| ())
    }

    async fn update(&self, name: &str) -> CliResult<()> {
        self.refresh().await?;
        let handle = self.ctx.registry.update(name)?;
        info!("Updating {}", handle.identifier());
        follow_pull(handle).await.map(|_| ())
    }

    async fn delete(&self, name: &str, yes: bool) -> CliResult<()> {
        self.refresh().await?;

        let record = self
            .ctx
            .registry
            .find(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if !yes
            && !confirm(&format!(
                "Delete {} ({})?",
                record.name,
                format_size(record.size)
            ))?
        {
            print_info("Nothing deleted.");
            return Ok(());
        }

        self.ctx.registry.delete(&record.name).await?;
        println!(
            "{}",
            OutputStyle::default().success(&format!("Deleted {}", record.name))
        );
        Ok(())
    }

    async fn show(&self, name: &str, json: bool) -> CliResult<()> {
        self.refresh().await?;
        let details = self.ctx.registry.details(name).await?;

        if json {
            let rendered = serde_json::to_string_pretty(&details)
                .map_err(|e| CliError::Internal(e.to_string()))?;
            println!("{}", rendered);
        } else {
            println!("{}", render_details(&OutputStyle::default(), &details));
        }
        Ok(())
    }

    async fn usage(&self) -> CliResult<()> {
        self.refresh().await?;
        let style = OutputStyle::default();
        let usage = self.ctx.registry.disk_usage();

        println!("{}", style.section("Disk usage"));
        println!("{}", style.key_value("Models", &usage.model_count.to_string()));
        println!("{}", style.key_value("Total", &format_size(usage.total_bytes)));
        if let Some(largest) = &usage.largest {
            println!(
                "{}",
                style.key_value(
                    "Largest",
                    &format!("{} ({})", largest.name, format_size(largest.size))
                )
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Command for ModelsCommand {
    async fn execute(&self) -> CliResult<()> {
        match &self.action {
            ModelsSubcommand::List { json, .. } => self.list(*json).await,
            ModelsSubcommand::Pull { name } => self.pull(name).await,
            ModelsSubcommand::Update { name } => self.update(name).await,
            ModelsSubcommand::Delete { name, yes } => self.delete(name, *yes).await,
            ModelsSubcommand::Show { name, json } => self.show(name, *json).await,
            ModelsSubcommand::Usage => self.usage().await,
        }
    }
}

/// Drive a progress bar until the pull settles; Ctrl-C cancels it.
///
/// A cancelled pull is not an error; any other failure is.
pub async fn follow_pull(mut handle: PullHandle) -> CliResult<PullJob> {
    let pb = if VerbosityLevel::Normal.should_output() {
        create_pull_bar(handle.identifier())
    } else {
        ProgressBar::hidden()
    };
    update_pull_bar(&pb, &handle.job());

    loop {
        tokio::select! {
            update = handle.changed() => match update {
                Some(job) => update_pull_bar(&pb, &job),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupt received, cancelling pull");
                handle.cancel();
            }
        }
    }
    pb.finish_and_clear();

    let job = handle.job();
    match job.status {
        PullStatus::Complete => {
            println!("{}", OutputStyle::default().pull_result(&job));
            Ok(job)
        }
        PullStatus::Failed if job.is_cancelled() => {
            print_warning(&format!("Pull of {} cancelled", job.identifier));
            Ok(job)
        }
        _ => Err(CliError::PullFailed {
            model: job.identifier.clone(),
            message: job
                .error
                .clone()
                .unwrap_or_else(|| job.status.to_string()),
        }),
    }
}

/// Extended model metadata as key/value lines
pub fn render_details(style: &OutputStyle, details: &ModelDetails) -> String {
    let record = &details.record;
    let mut lines = vec![style.section(&record.name)];

    let mut push = |key: &str, value: &str| {
        if !value.is_empty() {
            lines.push(style.key_value(key, value));
        }
    };
    push("Family", &record.family);
    push("Parameters", &record.parameter_size);
    push("Quantization", &record.quantization_level);
    push("Format", &record.format);
    push("Size", &format_size(record.size));
    push(
        "Modified",
        &record.modified_at.format("%Y-%m-%d %H:%M").to_string(),
    );
    push("Digest", record.digest.get(..12).unwrap_or(&record.digest));
    if let Some(context) = details.context_length() {
        push("Context length", &context.to_string());
    }
    push("License", details.license.lines().next().unwrap_or_default());

    if !details.parameters.trim().is_empty() {
        lines.push(style.section("Parameters"));
        lines.extend(details.parameters.lines().map(|l| format!("  {}", l.trim())));
    }
    if !details.system.trim().is_empty() {
        lines.push(style.section("System prompt"));
        lines.push(format!("  {}", details.system.trim()));
    }
    lines.join("\n")
}

fn confirm(question: &str) -> CliResult<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
