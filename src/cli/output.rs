//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Delve CLI.

use crate::research::{RunState, StepEvent, StepKind, TaskStatus};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Delve banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                r#"
   {}
   {}
   {}
   {}
"#,
                " ___      _          ".bright_cyan().bold(),
                "|   \\ ___| |_ _____ ".cyan().bold(),
                "| |) / -_) \\ V / -_)".blue().bold(),
                "|___/\\___|_|\\_/\\___|".blue().bold(),
            );
            println!(
                "   {} {}\n",
                "Plan-then-execute research".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                r#"
 ___      _
|   \ ___| |_ _____
| |) / -_) \ V / -_)
|___/\___|_|\_/\___|

   Plan-then-execute research v{}
"#,
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message to stderr
    pub fn warning(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            eprintln!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print one research progress event
    pub fn step_event(&self, event: &StepEvent) {
        let line = event.summary();
        let seq = format!("[{:>2}]", event.seq);

        if !self.colored {
            println!("  {} {}", seq, line);
            return;
        }

        match &event.kind {
            StepKind::Run { state, .. } => {
                let styled = match state {
                    RunState::Completed => line.bright_green().bold().to_string(),
                    RunState::Failed => line.red().bold().to_string(),
                    _ => line.bright_white().bold().to_string(),
                };
                println!("  {} {}", seq.dimmed(), styled);
            }
            StepKind::Task { status, .. } => {
                let marker = match status {
                    TaskStatus::Pending => "○".dimmed().to_string(),
                    TaskStatus::Running => "↻".cyan().to_string(),
                    TaskStatus::Done => "✓".green().to_string(),
                    TaskStatus::Failed => "✗".red().to_string(),
                };
                println!("  {} {} {}", seq.dimmed(), marker, line);
            }
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message with next steps
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print a block of text (e.g. a Markdown report) as-is
    pub fn block(&self, text: &str) {
        println!("\n{}", text.trim_end());
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::TaskId;
    use chrono::Utc;
    use uuid::Uuid;

    fn events() -> Vec<StepEvent> {
        let kinds = [
            StepKind::Run {
                state: RunState::Gathering,
                detail: Some("3 tasks planned".to_string()),
            },
            StepKind::Task {
                task_id: TaskId::nth(0),
                description: "Background".to_string(),
                status: TaskStatus::Failed,
                evidence_count: 0,
                error: Some("timed out after 10 ms".to_string()),
            },
            StepKind::Run {
                state: RunState::Completed,
                detail: None,
            },
        ];
        kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| StepEvent {
                run_id: Uuid::nil(),
                seq: i as u32 + 1,
                at: Utc::now(),
                kind,
            })
            .collect()
    }

    #[test]
    fn test_output_constructors() {
        assert!(Output::new().colored);
        assert!(!Output::no_color().colored);
        assert!(Output::default().colored);
    }

    #[test]
    fn test_output_methods_no_panic() {
        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("test success");
            output.info("test info");
            output.warning("test warning");
            output.error("test error");
            output.created("file", "path/to/file");
            output.skipped("path", "reason");
            output.header("Test Header");
            output.subheader("Test Subheader");
            output.kv("key", "value");
            output.hint("hint message");
            output.command("some command");
            output.complete("complete message");
            output.block("# Report\n");
            output.newline();
            for event in events() {
                output.step_event(&event);
            }
        }
    }
}
