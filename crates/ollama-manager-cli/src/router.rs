// Command routing and dispatch

use clap::{Args, Parser, Subcommand};
use ollama_manager_config::{
    config::{normalize_host, validate_host},
    ManagerConfig, SamplingUpdate, Settings,
};
use ollama_manager_models::{ModelQuery, SortKey};
use tracing::debug;

use crate::{
    commands::{
        chat::ChatCommand, config::ConfigCommand, models::ModelsCommand, AppContext, Command,
    },
    error::CliResult,
    logging::init_logging,
};

/// olm - manage and chat with the models of a local Ollama daemon
#[derive(Parser, Debug)]
#[command(name = "olm")]
#[command(about = "Manage and chat with the models of a local Ollama daemon")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Ollama daemon URL (overrides config and OLLAMA_HOST)
    #[arg(long, global = true, value_name = "URL")]
    pub host: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, pull, update, delete and inspect installed models
    #[command(alias = "m")]
    Models {
        #[command(subcommand)]
        action: ModelsSubcommand,
    },

    /// Start an interactive chat session
    #[command(alias = "c")]
    Chat(ChatArgs),

    /// View or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigSubcommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModelsSubcommand {
    /// List installed models
    #[command(alias = "ls")]
    List {
        /// Only show models whose name, family or size contains TEXT
        #[arg(short, long, value_name = "TEXT")]
        search: Option<String>,

        /// Sort column: name, size, params, family or modified
        #[arg(long, default_value = "name")]
        sort: SortKey,

        /// Sort in descending order
        #[arg(long)]
        desc: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download a model
    Pull {
        /// Model name, e.g. llama3 or llama3:8b
        name: String,
    },

    /// Re-pull an installed model to get its latest version
    Update { name: String },

    /// Remove an installed model
    #[command(alias = "rm")]
    Delete {
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show details of an installed model
    Show {
        name: String,

        #[arg(long)]
        json: bool,
    },

    /// Show disk usage of installed models
    Usage,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Save the daemon URL to the global config file
    SetHost { url: String },
}

/// Options for a chat session
#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Model to chat with (defaults to the configured default model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt for this session
    #[arg(short, long)]
    pub system: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub top_p: Option<f32>,

    #[arg(long)]
    pub top_k: Option<u32>,

    #[arg(long)]
    pub mirostat_tau: Option<f32>,

    /// Context window in tokens
    #[arg(long)]
    pub num_ctx: Option<u32>,
}

impl ChatArgs {
    /// Sampling flags given on the command line
    pub fn sampling_update(&self) -> SamplingUpdate {
        SamplingUpdate {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            mirostat_tau: self.mirostat_tau,
            context_window: self.num_ctx,
        }
    }
}

impl ModelsSubcommand {
    /// Default command when none is given
    pub fn list() -> Self {
        ModelsSubcommand::List {
            search: None,
            sort: SortKey::Name,
            desc: false,
            json: false,
        }
    }

    /// Query for a `list` invocation
    pub fn query(&self) -> Option<ModelQuery> {
        match self {
            ModelsSubcommand::List {
                search, sort, desc, ..
            } => {
                let query = ModelQuery::new().sort_by(*sort).descending(*desc);
                Some(match search {
                    Some(text) => query.search(text.clone()),
                    None => query,
                })
            }
            _ => None,
        }
    }
}

/// Route and execute commands
pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments and execute the command
    pub async fn route() -> CliResult<()> {
        let cli = Cli::parse();
        Self::execute(cli).await
    }

    /// Execute already parsed arguments
    pub async fn execute(cli: Cli) -> CliResult<()> {
        init_logging(cli.verbose, cli.quiet);

        let config = Self::resolve_config(cli.host.as_deref())?;
        Settings::init(config.clone())?;
        debug!("Using Ollama at {}", config.host);

        let command = cli
            .command
            .unwrap_or(Commands::Models {
                action: ModelsSubcommand::list(),
            });

        match command {
            Commands::Config { action } => ConfigCommand::new(action, config).execute().await,
            Commands::Models { action } => {
                let ctx = AppContext::from_settings(config)?;
                ModelsCommand::new(ctx, action).execute().await
            }
            Commands::Chat(args) => {
                let ctx = AppContext::from_settings(config)?;
                ChatCommand::new(ctx, args).execute().await
            }
        }
    }

    /// Load configuration with full precedence, then apply `--host`
    pub fn resolve_config(host: Option<&str>) -> CliResult<ManagerConfig> {
        let mut config = ManagerConfig::load_with_precedence()?;
        if let Some(host) = host {
            let host = normalize_host(host);
            validate_host(&host)?;
            config.host = host;
        }
        Ok(config)
    }
}
