// CLI error types and user-facing messages

use ollama_manager_chat::ChatError;
use ollama_manager_client::DaemonError;
use ollama_manager_config::ConfigError;
use ollama_manager_models::{ErrorKind, RegistryError};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Pull of {model} failed: {message}")]
    PullFailed { model: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DaemonError> for CliError {
    fn from(err: DaemonError) -> Self {
        CliError::Registry(err.into())
    }
}

impl From<rustyline::error::ReadlineError> for CliError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        CliError::Internal(format!("line editor failed: {}", err))
    }
}

impl CliError {
    /// Failure category, when the error came from the registry or a chat
    /// session
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CliError::Registry(e) => Some(e.kind()),
            CliError::Chat(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        let hint = match self.kind() {
            Some(ErrorKind::UnreachableDaemon) => Some(
                "Is Ollama running? Start it with 'ollama serve' or point olm elsewhere with --host.",
            ),
            Some(ErrorKind::NotFound) => {
                Some("Run 'olm models list' to see installed models.")
            }
            Some(ErrorKind::DuplicatePull) => {
                Some("Wait for the running download to finish or cancel it first.")
            }
            Some(ErrorKind::NoModelSelected) => {
                Some("Pick a model with '/model <name>' or pass --model.")
            }
            Some(ErrorKind::SessionBusy) => Some("Press Ctrl-C to stop the current reply."),
            Some(ErrorKind::MalformedResponse) => {
                Some("Check that the host points at an Ollama daemon.")
            }
            Some(ErrorKind::InvalidParameter) | None => None,
        };

        match self {
            CliError::InvalidArgument { message } => format!(
                "Invalid argument: {}\n\nRun 'olm --help' for usage information.",
                message
            ),
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Config(e) => format!(
                "Configuration error: {}\n\nRun 'olm config show' to check your configuration.",
                e
            ),
            CliError::PullFailed { model, message } => {
                format!("Pull of {} failed: {}", model, message)
            }
            CliError::Internal(msg) => {
                format!("Internal error: {}\n\nPlease report this issue.", msg)
            }
            CliError::Registry(_) | CliError::Chat(_) => match hint {
                Some(hint) => format!("{}\n\n{}", self, hint),
                None => self.to_string(),
            },
        }
    }

    /// Get technical details for verbose mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

pub type CliResult<T> = Result<T, CliError>;
