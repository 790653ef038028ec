// Progress indicators for downloads and daemon calls

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use ollama_manager_models::{PullJob, PullStatus};

/// Create a spinner for long-running operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|e| {
            eprintln!("Failed to create spinner template: {}", e);
            ProgressStyle::default_spinner()
        });
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Create a byte-counting bar for a model download
pub fn create_pull_bar(identifier: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold} {msg:20} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|e| {
            eprintln!("Failed to create progress bar template: {}", e);
            ProgressStyle::default_bar()
        })
        .progress_chars("=>-");
    pb.set_style(style);
    pb.set_prefix(identifier.to_string());
    pb.set_message(PullStatus::Queued.to_string());
    pb
}

/// Reflect `job` on `pb`
pub fn update_pull_bar(pb: &ProgressBar, job: &PullJob) {
    if job.total > 0 && pb.length() != Some(job.total) {
        pb.set_length(job.total);
    }
    pb.set_position(job.completed.min(job.total));

    let message = if job.last_status.is_empty() || job.status.is_terminal() {
        job.status.to_string()
    } else {
        job.last_status.clone()
    };
    pb.set_message(message);
}
