// Output formatting and styling

use colored::Colorize;
use ollama_manager_config::{SamplingConfig, SamplingField};
use ollama_manager_models::{DiskUsage, ModelRecord, PullJob, PullStatus};

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    pub fn info(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "ℹ".blue(), msg)
        } else {
            format!("ℹ {}", msg)
        }
    }

    /// Format a command or identifier
    pub fn code(&self, code: &str) -> String {
        if self.use_colors {
            code.cyan().to_string()
        } else {
            code.to_string()
        }
    }

    /// Format the chat prompt
    pub fn prompt(&self, prompt: &str) -> String {
        if self.use_colors {
            format!("{} ", prompt.magenta().bold())
        } else {
            format!("{} ", prompt)
        }
    }

    pub fn header(&self, title: &str) -> String {
        if self.use_colors {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Format a section header
    pub fn section(&self, title: &str) -> String {
        let rule = "─".repeat(title.chars().count());
        if self.use_colors {
            format!("\n{}\n{}", title.bold().underline(), rule)
        } else {
            format!("\n{}\n{}", title, rule)
        }
    }

    pub fn list_item(&self, item: &str) -> String {
        format!("  • {}", item)
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.use_colors {
            format!("  {}: {}", key.bold(), value)
        } else {
            format!("  {}: {}", key, value)
        }
    }

    pub fn tip(&self, tip: &str) -> String {
        if self.use_colors {
            format!("{} {}", "💡".yellow(), tip)
        } else {
            format!("💡 {}", tip)
        }
    }

    /// Installed models as an aligned table; `selected` is marked with `*`
    pub fn model_table(&self, records: &[ModelRecord], selected: Option<&str>) -> String {
        const HEADERS: [&str; 5] = ["NAME", "SIZE", "PARAMS", "FAMILY", "MODIFIED"];

        let rows: Vec<[String; 5]> = records
            .iter()
            .map(|r| {
                [
                    r.name.clone(),
                    format_size(r.size),
                    or_dash(&r.parameter_size),
                    or_dash(&r.family),
                    r.modified_at.format("%Y-%m-%d %H:%M").to_string(),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let render = |cells: [&str; 5]| -> String {
            cells
                .iter()
                .zip(widths.iter())
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut lines = vec![format!("  {}", self.header(&render(HEADERS)))];
        for (record, row) in records.iter().zip(rows.iter()) {
            let marker = if selected.map_or(false, |s| record.matches(s)) {
                "*"
            } else {
                " "
            };
            let line = render([&row[0], &row[1], &row[2], &row[3], &row[4]]);
            lines.push(format!("{} {}", marker, line));
        }
        lines.join("\n")
    }

    /// One-line summary of local disk usage
    pub fn usage_summary(&self, usage: &DiskUsage) -> String {
        let mut line = format!(
            "{} model{} using {}",
            usage.model_count,
            if usage.model_count == 1 { "" } else { "s" },
            format_size(usage.total_bytes)
        );
        if let Some(largest) = &usage.largest {
            line.push_str(&format!(
                " (largest: {}, {})",
                largest.name,
                format_size(largest.size)
            ));
        }
        line
    }

    /// Final line for a finished pull
    pub fn pull_result(&self, job: &PullJob) -> String {
        match job.status {
            PullStatus::Complete => self.success(&format!(
                "Pulled {} ({})",
                job.identifier,
                format_size(job.total)
            )),
            PullStatus::Failed if job.is_cancelled() => {
                self.warning(&format!("Pull of {} cancelled", job.identifier))
            }
            PullStatus::Failed => self.error(&format!(
                "Pull of {} failed: {}",
                job.identifier,
                job.error.as_deref().unwrap_or("unknown error")
            )),
            _ => self.info(&format!("{}: {:.0}%", job.identifier, job.percentage())),
        }
    }

    /// Sampling parameters with their accepted ranges
    pub fn sampling_table(&self, sampling: &SamplingConfig) -> String {
        SamplingField::ALL
            .iter()
            .map(|field| {
                let value = match field {
                    SamplingField::Temperature => sampling.temperature.to_string(),
                    SamplingField::TopP => sampling.top_p.to_string(),
                    SamplingField::TopK => sampling.top_k.to_string(),
                    SamplingField::MirostatTau => sampling.mirostat_tau.to_string(),
                    SamplingField::ContextWindow => sampling.context_window.to_string(),
                };
                self.key_value(
                    field.name(),
                    &format!("{:<8} ({})", value, field.range_label()),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Human readable byte count in decimal units, as the daemon reports sizes
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

pub fn print_success(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.success(msg));
}

pub fn print_error(msg: &str) {
    let style = OutputStyle::default();
    eprintln!("{}", style.error(msg));
}

pub fn print_warning(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.warning(msg));
}

pub fn print_info(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.info(msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_style_without_colors() {
        let style = OutputStyle { use_colors: false };
        assert_eq!(style.success("test"), "✓ test");
        assert_eq!(style.error("test"), "✗ test");
        assert_eq!(style.warning("test"), "⚠ test");
        assert_eq!(style.info("test"), "ℹ test");
    }

    #[test]
    fn test_section_rule_matches_title_width() {
        let style = OutputStyle { use_colors: false };
        let result = style.section("Models");
        assert!(result.ends_with("──────"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1_500), "1.5 KB");
        assert_eq!(format_size(4_661_224_676), "4.7 GB");
    }
}
