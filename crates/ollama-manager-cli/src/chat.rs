// Interactive chat mode

use std::io::Write;

use ollama_manager_chat::{ChatError, ChatSession};
use ollama_manager_config::{settings, SamplingField, SamplingUpdate};
use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::debug;

use crate::{
    error::{CliError, CliResult},
    output::{print_error, print_info, print_success, print_warning, OutputStyle},
};

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplInput {
    Empty,
    Message(String),
    Command(SlashCommand),
}

/// Commands starting with `/`
#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    /// List installed models
    Models,
    /// Select a model
    Model(String),
    /// Change one sampling parameter
    Set { field: String, value: String },
    /// Show sampling parameters
    Params,
    /// Show (None) or replace the system prompt
    System(Option<String>),
    /// Forget the conversation
    Clear,
    /// Show (None) or change the daemon URL
    Host(Option<String>),
    /// Print model-management commands
    Manage,
    Help,
    Exit,
}

impl SlashCommand {
    /// Name and usage of each command, for `/help`
    pub const USAGE: [(&'static str, &'static str); 10] = [
        ("/models", "list installed models"),
        ("/model NAME", "chat with another installed model"),
        ("/set FIELD VALUE", "change a sampling parameter"),
        ("/params", "show sampling parameters and their ranges"),
        ("/system [TEXT]", "show or replace the system prompt"),
        ("/clear", "forget the conversation"),
        ("/host [URL]", "show or change the Ollama URL"),
        ("/manage", "show model management commands"),
        ("/help", "show this help"),
        ("/exit", "leave the chat"),
    ];
}

/// Parse one line of input.
///
/// A leading `//` sends the rest of the line, starting with `/`, as a message.
pub fn parse_input(line: &str) -> CliResult<ReplInput> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplInput::Empty);
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Ok(ReplInput::Message(format!("/{}", escaped)));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ReplInput::Message(line.to_string()));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    let missing = |usage: &str| CliError::InvalidArgument {
        message: format!("usage: {}", usage),
    };

    let parsed = match name.to_lowercase().as_str() {
        "models" => SlashCommand::Models,
        "model" => SlashCommand::Model(argument.ok_or_else(|| missing("/model NAME"))?),
        "set" => {
            let (field, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| missing("/set FIELD VALUE"))?;
            SlashCommand::Set {
                field: field.to_string(),
                value: value.trim().to_string(),
            }
        }
        "params" => SlashCommand::Params,
        "system" => SlashCommand::System(argument),
        "clear" => SlashCommand::Clear,
        "host" => SlashCommand::Host(argument),
        "manage" => SlashCommand::Manage,
        "help" | "?" => SlashCommand::Help,
        "exit" | "quit" | "q" => SlashCommand::Exit,
        other => {
            return Err(CliError::InvalidArgument {
                message: format!("unknown command '/{}', type /help for the list", other),
            })
        }
    };
    Ok(ReplInput::Command(parsed))
}

/// Read-eval-print loop around a chat session
pub struct ChatRepl {
    session: ChatSession,
    style: OutputStyle,
}

impl ChatRepl {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            style: OutputStyle::default(),
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Run until `/exit` or end of input
    pub async fn run(&self) -> CliResult<()> {
        let mut editor = DefaultEditor::new()?;
        self.print_banner();

        loop {
            let prompt = self.prompt();
            let line = match tokio::task::block_in_place(|| editor.readline(&prompt)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };
            let _ = editor.add_history_entry(line.as_str());

            let outcome = match parse_input(&line) {
                Ok(ReplInput::Empty) => Ok(()),
                Ok(ReplInput::Message(text)) => self.send(&text).await,
                Ok(ReplInput::Command(SlashCommand::Exit)) => break,
                Ok(ReplInput::Command(command)) => self.handle(command).await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                print_error(&e.user_message());
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn prompt(&self) -> String {
        let model = self.session.model().unwrap_or_else(|| "no model".to_string());
        self.style.prompt(&format!("{} >", model))
    }

    fn print_banner(&self) {
        println!("{}", self.style.header("Ollama chat"));
        match self.session.model() {
            Some(model) => print_info(&format!("Chatting with {}", model)),
            None => print_warning("No model selected. Use /models and /model NAME."),
        }
        println!("{}", self.style.tip("Type /help for commands, Ctrl-C stops a reply."));
        println!();
    }

    /// Send `text` and print the reply as it streams; Ctrl-C cancels it
    pub async fn send(&self, text: &str) -> CliResult<()> {
        let mut stream = self.session.send(text)?;
        let mut stdout = std::io::stdout();
        let mut printed = false;

        loop {
            tokio::select! {
                fragment = stream.next() => match fragment {
                    Some(Ok(fragment)) => {
                        print!("{}", fragment);
                        stdout.flush()?;
                        printed = true;
                    }
                    Some(Err(e)) => {
                        if printed {
                            println!();
                        }
                        return Err(e.into());
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    debug!("Interrupt received, cancelling reply");
                    stream.cancel();
                    println!();
                    print_warning("Reply cancelled");
                    return Ok(());
                }
            }
        }

        println!();
        Ok(())
    }

    /// Execute a slash command other than `/exit`
    pub async fn handle(&self, command: SlashCommand) -> CliResult<()> {
        let registry = self.session.registry();

        match command {
            SlashCommand::Models => {
                registry.list().await?;
                let records = registry.snapshot().records.clone();
                if records.is_empty() {
                    print_info("No models installed. Pull one with 'olm models pull <name>'.");
                } else {
                    let selected = self.session.model();
                    println!("{}", self.style.model_table(&records, selected.as_deref()));
                }
            }
            SlashCommand::Model(name) => {
                if registry.find(&name).is_none() {
                    registry.list().await?;
                }
                let model = self.session.set_model(&name)?;
                print_success(&format!("Now chatting with {}", model));
            }
            SlashCommand::Set { field, value } => {
                let update = SamplingUpdate::parse_field(&field, &value).map_err(ChatError::from)?;
                self.session.update_sampling_config(&update)?;
                let field: SamplingField = field.parse().map_err(ChatError::from)?;
                print_success(&format!("{} set to {}", field, value));
            }
            SlashCommand::Params => {
                println!("{}", self.style.sampling_table(&self.session.sampling()));
            }
            SlashCommand::System(Some(prompt)) => {
                self.session.set_system_prompt(prompt);
                print_success("System prompt updated");
            }
            SlashCommand::System(None) => {
                println!("{}", self.style.key_value("System", &self.session.system_prompt()));
            }
            SlashCommand::Clear => {
                self.session.clear()?;
                print_success("Conversation cleared");
            }
            SlashCommand::Host(Some(url)) => {
                settings().set_host(&url)?;
                print_success(&format!("Ollama host set to {}", settings().host()));
                match registry.list().await {
                    Ok(records) => print_info(&format!("{} models available", records.len())),
                    Err(e) => print_warning(&e.to_string()),
                }
            }
            SlashCommand::Host(None) => {
                println!("{}", self.style.key_value("Host", &settings().host()));
            }
            SlashCommand::Manage => self.print_manage(),
            SlashCommand::Help => self.print_help(),
            SlashCommand::Exit => {}
        }
        Ok(())
    }

    fn print_help(&self) {
        println!("{}", self.style.section("Commands"));
        for (usage, description) in SlashCommand::USAGE {
            println!("  {:<18} {}", self.style.code(usage), description);
        }
        println!("  {:<18} {}", self.style.code("//TEXT"), "send a message starting with '/'");
    }

    fn print_manage(&self) {
        println!("{}", self.style.section("Model management"));
        for line in [
            "olm models list [--search TEXT] [--sort KEY] [--desc]",
            "olm models pull NAME",
            "olm models update NAME",
            "olm models delete NAME",
            "olm models show NAME",
            "olm models usage",
        ] {
            println!("{}", self.style.list_item(&self.style.code(line)));
        }
    }
}
