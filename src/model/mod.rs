//! Uniform call interface to the language-model backend.
//!
//! Every stage talks to the model through [`ModelClient`]. The client never
//! retries: callers decide whether a failed call is fatal for them.

mod openai;
#[cfg(test)]
pub(crate) mod testing;

pub use openai::{OpenAIModelClient, OpenAIProvider};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Binary content sent inline with a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineBlob {
    /// Base64-encoded payload.
    pub base64: String,
    /// MIME type of the payload (e.g. `image/png`).
    pub mime_type: String,
}

impl InlineBlob {
    pub fn new(base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Render as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Description of a tool offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments.
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Backend-assigned call id, echoed back with the result.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments.
    pub arguments: String,
}

/// One entry of a tool-use conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    System(String),
    User(String),
    /// The model asked for these tools to be run.
    ToolRequest(Vec<ToolInvocation>),
    ToolResult { call_id: String, content: String },
}

/// What the model did on one conversational step.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    ToolCalls(Vec<ToolInvocation>),
    Final(String),
}

/// Call interface to the model backend.
///
/// Both methods fail with `Credential` when no access credential is
/// configured, `Backend` for any non-success response (message verbatim)
/// and `EmptyResponse` when a success carries no usable text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Single-shot text generation, optionally with an inline blob.
    async fn generate(&self, prompt: &str, blob: Option<&InlineBlob>) -> Result<String>;

    /// One step of a tool-use conversation.
    async fn converse(&self, turns: &[Turn], tools: &[ToolSpec]) -> Result<ModelTurn>;
}

/// Builds a model client for one pipeline run.
pub trait ModelProvider: Send + Sync {
    fn connect(&self, credential: Option<&str>, model_id: &str) -> Result<Arc<dyn ModelClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_blob_data_url() {
        let blob = InlineBlob::new("aGVsbG8=", "image/png");
        assert_eq!(blob.data_url(), "data:image/png;base64,aGVsbG8=");
        assert!(blob.is_image());
        assert!(!InlineBlob::new("", "audio/mpeg").is_image());
    }
}
