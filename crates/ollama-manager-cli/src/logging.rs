// Logging and verbosity control

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::Level;

/// Environment variable overriding the log level (error, warn, info, debug, trace)
pub const LOG_ENV: &str = "OLM_LOG";

static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Quiet mode - errors only
    Quiet = 0,
    /// Normal mode - standard output
    Normal = 1,
    /// Verbose mode - detailed output
    Verbose = 2,
}

impl VerbosityLevel {
    pub fn current() -> Self {
        match VERBOSITY.load(Ordering::Relaxed) {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Normal,
            _ => VerbosityLevel::Verbose,
        }
    }

    pub fn set(level: Self) {
        VERBOSITY.store(level as u8, Ordering::Relaxed);
    }

    /// Check if we should output at this level
    pub fn should_output(&self) -> bool {
        self <= &Self::current()
    }
}

/// Tracing level for the given flags; `env` wins when it names a level
pub fn level_for(verbose: bool, quiet: bool, env: Option<&str>) -> Level {
    if let Some(level) = env.and_then(parse_level) {
        return level;
    }
    if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Initialize logging based on CLI flags.
///
/// Logs go to stderr so they never mix with streamed replies on stdout.
pub fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        VerbosityLevel::Quiet
    } else if verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    };
    VerbosityLevel::set(level);

    let env = std::env::var(LOG_ENV).ok();
    let max_level = level_for(verbose, quiet, env.as_deref());

    // A subscriber may already be installed (tests, repeated routing)
    let _ = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print a message to stderr at the given verbosity level
pub fn log_at_level(level: VerbosityLevel, message: &str) {
    if level.should_output() {
        eprintln!("{}", message);
    }
}
