//! OpenAI-compatible chat-completions backend.

use super::{InlineBlob, ModelClient, ModelProvider, ModelTurn, ToolInvocation, ToolSpec, Turn};
use crate::config::ModelSettings;
use crate::error::{QuizError, Result};
use crate::openai::{create_client, require_credential};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall, FunctionObject,
    ImageUrlArgs,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Model client backed by an OpenAI-compatible endpoint.
pub struct OpenAIModelClient {
    /// `None` when no credential was supplied; every call then fails.
    client: Option<async_openai::Client<async_openai::config::OpenAIConfig>>,
    model: String,
    temperature: f32,
}

impl OpenAIModelClient {
    /// Create a client for the given credential and model.
    pub fn new(credential: Option<&str>, model: &str, settings: &ModelSettings) -> Result<Self> {
        let client = match require_credential(credential) {
            Ok(key) => Some(create_client(
                key,
                settings.api_base.as_deref(),
                Duration::from_secs(settings.timeout_secs),
            )?),
            Err(_) => None,
        };

        Ok(Self {
            client,
            model: model.to_string(),
            temperature: settings.temperature,
        })
    }

    fn client(&self) -> Result<&async_openai::Client<async_openai::config::OpenAIConfig>> {
        self.client.as_ref().ok_or(QuizError::Credential)
    }

    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: &[ToolSpec],
    ) -> Result<CreateChatCompletionResponse> {
        let client = self.client()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature);
        if !tools.is_empty() {
            builder.tools(tools.iter().map(to_openai_tool).collect::<Vec<_>>());
        }
        let request = builder.build().map_err(request_error)?;

        client.chat().create(request).await.map_err(backend_error)
    }
}

#[async_trait]
impl ModelClient for OpenAIModelClient {
    #[instrument(skip(self, prompt, blob), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, blob: Option<&InlineBlob>) -> Result<String> {
        let user_message = match blob {
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(request_error)?,
            Some(blob) if blob.is_image() => {
                let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text(prompt)
                        .build()
                        .map_err(request_error)?
                        .into(),
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(
                            ImageUrlArgs::default()
                                .url(blob.data_url())
                                .build()
                                .map_err(request_error)?,
                        )
                        .build()
                        .map_err(request_error)?
                        .into(),
                ];
                ChatCompletionRequestUserMessageArgs::default()
                    .content(parts)
                    .build()
                    .map_err(request_error)?
            }
            Some(blob) => {
                return Err(QuizError::InvalidInput(format!(
                    "Inline content of type {} is not supported by this backend",
                    blob.mime_type
                )))
            }
        };

        let response = self.complete(vec![user_message.into()], &[]).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(QuizError::EmptyResponse)?;

        debug!("Generated {} characters", text.len());
        Ok(text)
    }

    #[instrument(skip(self, turns, tools), fields(model = %self.model, turns = turns.len()))]
    async fn converse(&self, turns: &[Turn], tools: &[ToolSpec]) -> Result<ModelTurn> {
        let messages = turns
            .iter()
            .map(to_openai_message)
            .collect::<Result<Vec<_>>>()?;

        let response = self.complete(messages, tools).await?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(QuizError::EmptyResponse)?;

        if let Some(calls) = message.tool_calls.filter(|c| !c.is_empty()) {
            return Ok(ModelTurn::ToolCalls(
                calls
                    .into_iter()
                    .map(|c| ToolInvocation {
                        id: c.id,
                        name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect(),
            ));
        }

        message
            .content
            .filter(|t| !t.trim().is_empty())
            .map(ModelTurn::Final)
            .ok_or(QuizError::EmptyResponse)
    }
}

fn to_openai_message(turn: &Turn) -> Result<ChatCompletionRequestMessage> {
    let message = match turn {
        Turn::System(text) => ChatCompletionRequestSystemMessageArgs::default()
            .content(text.clone())
            .build()
            .map_err(request_error)?
            .into(),
        Turn::User(text) => ChatCompletionRequestUserMessageArgs::default()
            .content(text.clone())
            .build()
            .map_err(request_error)?
            .into(),
        Turn::ToolRequest(calls) => ChatCompletionRequestAssistantMessageArgs::default()
            .tool_calls(
                calls
                    .iter()
                    .map(|c| ChatCompletionMessageToolCall {
                        id: c.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect::<Vec<_>>(),
            )
            .build()
            .map_err(request_error)?
            .into(),
        Turn::ToolResult { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id.clone())
            .content(content.clone())
            .build()
            .map_err(request_error)?
            .into(),
    };
    Ok(message)
}

fn to_openai_tool(spec: &ToolSpec) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters: Some(spec.parameters.clone()),
            strict: None,
        },
    }
}

/// Map a transport or API failure, keeping the backend's own message.
fn backend_error(err: OpenAIError) -> QuizError {
    match err {
        OpenAIError::ApiError(api) => QuizError::Backend(api.message),
        other => QuizError::Backend(other.to_string()),
    }
}

fn request_error(err: OpenAIError) -> QuizError {
    QuizError::InvalidInput(format!("Failed to build model request: {}", err))
}

/// Provider that connects [`OpenAIModelClient`]s from model settings.
pub struct OpenAIProvider {
    settings: ModelSettings,
}

impl OpenAIProvider {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }
}

impl ModelProvider for OpenAIProvider {
    fn connect(
        &self,
        credential: Option<&str>,
        model_id: &str,
    ) -> Result<Arc<dyn ModelClient>> {
        let model = if model_id.trim().is_empty() {
            self.settings.model.as_str()
        } else {
            model_id
        };
        Ok(Arc::new(OpenAIModelClient::new(credential, model, &self.settings)?))
    }
}
