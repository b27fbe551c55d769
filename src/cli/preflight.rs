//! Pre-flight checks before expensive operations.
//!
//! Validates that configuration is usable before a run that would otherwise
//! fail midway.

use crate::agent::GenerationPlan;
use crate::config::Settings;
use crate::error::{QuizError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// A quiz run needs a credential and a valid generation plan.
    Quiz,
    /// The server takes credentials per request but still needs a valid plan.
    Serve,
    /// Memory commands only touch local files.
    Memory,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings, api_key: Option<&str>) -> Result<()> {
    match operation {
        Operation::Quiz => {
            check_api_key(api_key)?;
            check_plan(settings)?;
        }
        Operation::Serve => {
            check_plan(settings)?;
        }
        Operation::Memory => {}
    }
    Ok(())
}

/// Check that an API key was given on the command line or in the environment.
fn check_api_key(api_key: Option<&str>) -> Result<()> {
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(QuizError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(QuizError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...' or pass --api-key".to_string(),
        )),
    }
}

/// Reading the document from stdin leaves nothing to answer the approval
/// prompt with, so `-` needs `--yes`.
pub fn check_document_source(input: &str, auto_approve: bool) -> Result<()> {
    if input == "-" && !auto_approve {
        return Err(QuizError::Config(
            "Reading the document from stdin needs --yes, since the approval prompt also reads stdin".to_string(),
        ));
    }
    Ok(())
}

fn check_plan(settings: &Settings) -> Result<()> {
    GenerationPlan::new(settings.generation.tasks.clone()).map(|_| ())
}
