//! CLI output formatting utilities.

use crate::events::{EventKind, ProgressEvent};
use crate::quiz::Question;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Render a pipeline progress event as one styled line.
    pub fn format_event(event: &ProgressEvent) -> String {
        let kind = format!("{:<11}", event.kind.to_string());
        let kind = match event.kind {
            EventKind::Error => style(kind).red(),
            EventKind::Action | EventKind::Start => style(kind).yellow(),
            EventKind::Observation => style(kind).magenta(),
            EventKind::Response | EventKind::Done => style(kind).green(),
            EventKind::Memory => style(kind).blue(),
            EventKind::Info => style(kind).cyan(),
        };
        format!(
            "  {} {} {}",
            kind,
            style(format!("[{}]", event.source)).dim(),
            content_preview(&event.message, 160)
        )
    }

    /// Print one quiz question with its answer.
    pub fn question(number: usize, question: &Question) {
        println!(
            "\n{} {} {}",
            style(format!("{}.", number)).cyan().bold(),
            style(question.text()).bold(),
            style(format!("({})", question.kind())).dim()
        );
        match question {
            Question::MultipleChoice(q) => {
                for (i, option) in q.options.iter().enumerate() {
                    let marker = if i == q.correct_index { style("+").green() } else { style("-").dim() };
                    println!("   {} {}", marker, option);
                }
            }
            Question::TrueFalse(q) => Self::kv("Answer", if q.correct_answer { "true" } else { "false" }),
            Question::FillBlank(q) => Self::kv("Accepts", &q.acceptable_answers.join(", ")),
            Question::Matching(q) => {
                for pair in &q.pairs {
                    println!("   {} {} {}", pair.left, style("->").dim(), pair.right);
                }
            }
            Question::Ordering(q) => {
                for (position, index) in q.correct_order.iter().enumerate() {
                    if let Some(item) = q.items.get(*index) {
                        println!("   {} {}", style(format!("{}.", position + 1)).dim(), item);
                    }
                }
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(template);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Collapse newlines and truncate with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
