//! Human-in-the-loop checkpoint between research and generation.

use crate::quiz::FactSet;
use async_trait::async_trait;
use console::style;
use std::io::{self, Write};
use tracing::warn;

/// Decides whether generation may proceed from a fact set.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// `true` to proceed, `false` to abort the run.
    async fn review(&self, facts: &FactSet) -> bool;
}

/// Gate with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticApproval(pub bool);

impl StaticApproval {
    pub fn approve() -> Self {
        Self(true)
    }

    pub fn reject() -> Self {
        Self(false)
    }
}

#[async_trait]
impl ApprovalGate for StaticApproval {
    async fn review(&self, _facts: &FactSet) -> bool {
        self.0
    }
}

/// Shows the facts on the terminal and asks for confirmation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleApproval;

#[async_trait]
impl ApprovalGate for ConsoleApproval {
    async fn review(&self, facts: &FactSet) -> bool {
        let facts = facts.clone();
        let answer = tokio::task::spawn_blocking(move || {
            println!("\n{}", style("Extracted facts").bold().underlined());
            for (i, fact) in facts.facts().iter().enumerate() {
                println!("  {} {}", style(format!("{}.", i + 1)).cyan(), fact);
            }
            prompt_continue("Generate quiz from these facts?")
        })
        .await;

        match answer {
            Ok(Ok(proceed)) => proceed,
            Ok(Err(e)) => {
                warn!("Could not read approval: {}", e);
                false
            }
            Err(e) => {
                warn!("Approval prompt failed: {}", e);
                false
            }
        }
    }
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("\n{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[tokio::test]
    async fn test_static_gate() {
        let facts = FactSet::from_model_output("1. Fact").unwrap();
        assert!(StaticApproval::approve().review(&facts).await);
        assert!(!StaticApproval::reject().review(&facts).await);
    }
}
