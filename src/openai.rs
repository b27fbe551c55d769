//! OpenAI client configuration with sensible defaults.

use crate::error::{QuizError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for a single model call (2 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create an OpenAI client for the given credential with a per-call timeout.
///
/// The timeout lives on the HTTP client, so it bounds each request on its
/// own and never the pipeline run as a whole. Retries are disabled: a
/// rate-limited response comes back as an error on the first attempt.
pub fn create_client(
    api_key: &str,
    api_base: Option<&str>,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base.filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retry()))
}

/// Backoff policy that gives up after the first failed attempt.
fn no_retry() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

/// Check whether a credential was supplied at all.
pub fn require_credential(credential: Option<&str>) -> Result<&str> {
    match credential.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(QuizError::Credential),
    }
}
