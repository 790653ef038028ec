// Ollama Manager CLI entry point

use anyhow::Context;
use ollama_manager_cli::{output, router::CommandRouter, VerbosityLevel};

fn main() -> anyhow::Result<()> {
    // The chat prompt blocks on stdin inside the runtime, which needs worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    if let Err(e) = runtime.block_on(CommandRouter::route()) {
        output::print_error(&e.user_message());
        if VerbosityLevel::current() == VerbosityLevel::Verbose {
            eprintln!("{}", e.technical_details());
        }
        std::process::exit(1);
    }

    Ok(())
}
