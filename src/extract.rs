//! Turns inline media into plain study text before research.

use crate::config::ExtractionPrompts;
use crate::error::{QuizError, Result};
use crate::events::{EventKind, ProgressSink};
use crate::model::{InlineBlob, ModelClient};
use std::sync::Arc;
use tracing::{info, instrument};

/// Event source name of the extraction step.
pub const EXTRACTOR: &str = "Extractor";

/// Asks the model to describe or transcribe a blob.
pub struct ContentExtractor {
    client: Arc<dyn ModelClient>,
    prompts: ExtractionPrompts,
}

impl ContentExtractor {
    pub fn new(client: Arc<dyn ModelClient>, prompts: ExtractionPrompts) -> Self {
        Self { client, prompts }
    }

    /// Extract text from `blob`, using the instruction for `format`.
    #[instrument(skip(self, blob, events), fields(mime = %blob.mime_type))]
    pub async fn extract(&self, blob: &InlineBlob, format: &str, events: &ProgressSink) -> Result<String> {
        if blob.base64.trim().is_empty() {
            return Err(QuizError::InvalidInput("inline document has no content".to_string()));
        }

        events.emit(EXTRACTOR, EventKind::Info, format!("Extracting text from {} content", format));
        let text = self
            .client
            .generate(self.prompts.for_format(format), Some(blob))
            .await?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(QuizError::EmptyResponse);
        }

        info!("Extracted {} characters", text.len());
        events.emit(EXTRACTOR, EventKind::Done, format!("Extracted {} characters", text.len()));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testing::ScriptedClient;

    #[tokio::test]
    async fn test_uses_format_prompt() {
        let client = Arc::new(ScriptedClient::new().with_responder(|prompt| {
            if prompt.contains("OCR") {
                Ok("  The sky is blue.\n".to_string())
            } else {
                Ok("wrong prompt".to_string())
            }
        }));
        let extractor = ContentExtractor::new(client.clone(), ExtractionPrompts::default());

        let text = extractor
            .extract(&InlineBlob::new("aGVsbG8=", "image/png"), "image", &ProgressSink::silent())
            .await
            .unwrap();

        assert_eq!(text, "The sky is blue.");
        assert_eq!(client.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_blob_rejected() {
        let client = Arc::new(ScriptedClient::new());
        let extractor = ContentExtractor::new(client.clone(), ExtractionPrompts::default());

        let err = extractor
            .extract(&InlineBlob::new("", "image/png"), "image", &ProgressSink::silent())
            .await
            .unwrap_err();

        assert!(matches!(err, QuizError::InvalidInput(_)));
        assert_eq!(client.generate_calls(), 0);
    }
}
