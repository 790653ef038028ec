// Chat command

use async_trait::async_trait;
use ollama_manager_chat::ChatSession;
use tracing::warn;

use crate::{
    chat::ChatRepl,
    commands::{AppContext, Command},
    error::{CliError, CliResult},
    output::print_warning,
    router::ChatArgs,
};

/// Start an interactive chat session
pub struct ChatCommand {
    ctx: AppContext,
    args: ChatArgs,
}

impl ChatCommand {
    pub fn new(ctx: AppContext, args: ChatArgs) -> Self {
        Self { ctx, args }
    }

    /// Session configured from the config file and command-line flags.
    ///
    /// An unreachable daemon is reported but does not prevent chatting later
    /// (the host can still be changed with `/host`); an unknown `--model` is
    /// an error.
    pub async fn prepare_session(&self) -> CliResult<ChatSession> {
        let session = ChatSession::with_config(self.ctx.registry.clone(), &self.ctx.config);

        if let Some(system) = &self.args.system {
            session.set_system_prompt(system.clone());
        }
        let update = self.args.sampling_update();
        if !update.is_empty() {
            session.update_sampling_config(&update)?;
        }

        if let Err(e) = self.ctx.registry.list().await {
            if !e.is_retryable() {
                return Err(e.into());
            }
            warn!("Could not list models: {}", e);
            print_warning(&CliError::from(e).user_message());
        }

        match &self.args.model {
            Some(model) => {
                session.set_model(model)?;
            }
            None => {
                session.select_default_model(Some(&self.ctx.config.default_model));
            }
        }
        Ok(session)
    }
}

#[async_trait]
impl Command for ChatCommand {
    async fn execute(&self) -> CliResult<()> {
        let session = self.prepare_session().await?;
        ChatRepl::new(session).run().await
    }
}
