//! Scripted model client for tests.

use super::{InlineBlob, ModelClient, ModelProvider, ModelTurn, ToolSpec, Turn};
use crate::error::{QuizError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Model double: `converse` replays a script, `generate` routes by prompt.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<ModelTurn>>>,
    responder: Responder,
    /// Prompt substring -> artificial latency.
    delays: Vec<(String, Duration)>,
    pub prompts: Mutex<Vec<String>>,
    pub conversations: Mutex<Vec<Vec<Turn>>>,
    pub offered_tools: Mutex<Vec<usize>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(|_| Err(QuizError::EmptyResponse)),
            delays: Vec::new(),
            prompts: Mutex::new(Vec::new()),
            conversations: Mutex::new(Vec::new()),
            offered_tools: Mutex::new(Vec::new()),
        }
    }

    pub fn with_turns(mut self, turns: Vec<Result<ModelTurn>>) -> Self {
        self.script = Mutex::new(turns.into());
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    pub fn with_delay(mut self, prompt_marker: &str, delay: Duration) -> Self {
        self.delays.push((prompt_marker.to_string(), delay));
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn generate(&self, prompt: &str, _blob: Option<&InlineBlob>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let delay = self
            .delays
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(prompt)
    }

    async fn converse(&self, turns: &[Turn], tools: &[ToolSpec]) -> Result<ModelTurn> {
        self.conversations.lock().unwrap().push(turns.to_vec());
        self.offered_tools.lock().unwrap().push(tools.len());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(QuizError::EmptyResponse))
    }
}

/// Provider handing out one shared scripted client.
pub struct ScriptedProvider(pub Arc<ScriptedClient>);

impl ModelProvider for ScriptedProvider {
    fn connect(&self, _credential: Option<&str>, _model_id: &str) -> Result<Arc<dyn ModelClient>> {
        Ok(self.0.clone())
    }
}

/// Canned examiner output, keyed on which kind a prompt asks for.
pub fn examiner_reply(prompt: &str) -> Result<String> {
    if prompt.contains("multiple-choice question") {
        Ok(r#"```json
[
  {"type": "multiple-choice", "question": "What colour is the sky?", "options": ["Blue", "Green", "Red", "Black"], "correctIndex": 0},
  {"type": "multiple-choice", "question": "At what temperature does water boil?", "options": ["50C", "100C"], "correctIndex": 1},
  {"type": "multiple-choice", "question": "Which is a liquid?", "options": ["Water", "Sky"], "correctIndex": 0}
]
```"#
            .to_string())
    } else if prompt.contains("true-false question") {
        Ok(r#"[{"type": "true-false", "question": "The sky is blue.", "correctAnswer": true}]"#.to_string())
    } else if prompt.contains("fill-blank question") {
        Ok(r#"Sure! [{"type": "fill-blank", "question": "Water boils at ___.", "correctAnswer": "100C", "acceptableAnswers": ["100C", "100 C"], "caseSensitive": false}]"#.to_string())
    } else {
        Err(QuizError::Backend(format!("unexpected prompt: {}", prompt)))
    }
}
