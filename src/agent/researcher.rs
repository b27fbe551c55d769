//! Research stage: a bounded tool-use loop that extracts the fact set.

use super::tools::{parse_tool_call, tool_definitions, ToolContext};
use crate::config::Prompts;
use crate::error::{QuizError, Result};
use crate::events::{EventKind, ProgressSink};
use crate::model::{ModelClient, ModelTurn, ToolInvocation, ToolSpec, Turn};
use crate::quiz::{FactSet, FACT_TARGET};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Event source name of the research stage.
pub const RESEARCHER: &str = "Researcher";

/// Combine session weaknesses with historical ones, keeping first-seen order.
pub fn merge_weaknesses<'a>(
    session: &'a [String],
    historical: impl IntoIterator<Item = &'a String>,
) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for weakness in session.iter().chain(historical) {
        let weakness = weakness.trim();
        if !weakness.is_empty() && !merged.iter().any(|w| w == weakness) {
            merged.push(weakness.to_string());
        }
    }
    merged
}

/// Focus description handed to the researcher.
pub fn research_focus(weaknesses: &[String]) -> String {
    if weaknesses.is_empty() {
        "general concepts".to_string()
    } else {
        format!("concepts related to: {}", weaknesses.join(", "))
    }
}

/// Agent that reads a document, optionally searching it, and states facts.
pub struct Researcher {
    client: Arc<dyn ModelClient>,
    prompts: Prompts,
    max_iterations: usize,
}

impl Researcher {
    pub fn new(client: Arc<dyn ModelClient>, prompts: Prompts) -> Self {
        Self {
            client,
            prompts,
            max_iterations: 6,
        }
    }

    /// Set the number of tool-enabled model calls before a final answer is forced.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Run the loop over `document` with the given focus.
    ///
    /// Calls are strictly sequential: thought, tool calls, then the final
    /// response, each reported to `events` in that order.
    #[instrument(skip(self, document, events), fields(focus = %focus, doc_len = document.len()))]
    pub async fn run(&self, document: &str, focus: &str, events: &ProgressSink) -> Result<ResearchReport> {
        let tools = ToolContext::new(document);
        let definitions = tool_definitions();

        let mut vars = HashMap::new();
        vars.insert("fact_count".to_string(), FACT_TARGET.to_string());
        vars.insert("focus".to_string(), focus.to_string());
        vars.insert("document".to_string(), document.to_string());

        let mut turns = vec![
            Turn::System(self.prompts.render_with_custom(&self.prompts.research.system, &vars)),
            Turn::User(self.prompts.render_with_custom(&self.prompts.research.user, &vars)),
        ];

        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            let tools_offered = iterations <= self.max_iterations;

            if iterations == 1 {
                events.emit(
                    RESEARCHER,
                    EventKind::Info,
                    format!(
                        "Extracting {} facts about {}. Tools: {}",
                        FACT_TARGET,
                        focus,
                        definitions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                );
            } else if tools_offered {
                events.emit(
                    RESEARCHER,
                    EventKind::Info,
                    format!("Reviewing {} search result(s)", tool_calls_made.len()),
                );
            } else {
                events.emit(RESEARCHER, EventKind::Info, "Search budget spent, writing facts");
                turns.push(Turn::User(
                    self.prompts.render_with_custom(&self.prompts.research.finalize, &vars),
                ));
            }

            debug!("Research iteration {}", iterations);

            let offered: &[ToolSpec] = if tools_offered { definitions.as_slice() } else { &[] };
            match self.client.converse(&turns, offered).await? {
                ModelTurn::ToolCalls(calls) => {
                    if !tools_offered {
                        return Err(QuizError::ResearchIncomplete(format!(
                            "model kept requesting tools after {} iterations",
                            self.max_iterations
                        )));
                    }

                    turns.push(Turn::ToolRequest(calls.clone()));
                    for call in &calls {
                        let record = self.execute_tool_call(&tools, call, events);
                        turns.push(Turn::ToolResult {
                            call_id: call.id.clone(),
                            content: record.result.clone(),
                        });
                        tool_calls_made.push(record);
                    }
                }
                ModelTurn::Final(text) => {
                    let facts = FactSet::from_model_output(&text)?;
                    events.emit(
                        RESEARCHER,
                        EventKind::Response,
                        format!("Extracted {} facts", facts.len()),
                    );
                    info!("Research finished after {} iteration(s)", iterations);
                    return Ok(ResearchReport {
                        facts,
                        tool_calls: tool_calls_made,
                        iterations,
                    });
                }
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    fn execute_tool_call(
        &self,
        tools: &ToolContext,
        call: &ToolInvocation,
        events: &ProgressSink,
    ) -> ToolCallRecord {
        events.emit(
            RESEARCHER,
            EventKind::Action,
            format!("Calling {} with {}", call.name, call.arguments),
        );

        let result = match parse_tool_call(&call.name, &call.arguments) {
            Ok(tool) => {
                let (output, hits) = tools.execute(&tool);
                events.emit(
                    RESEARCHER,
                    EventKind::Observation,
                    format!("{} found {} match(es)", tool, hits),
                );
                output
            }
            Err(e) => {
                let message = format!("Tool error: {}", e);
                events.emit(RESEARCHER, EventKind::Observation, message.clone());
                message
            }
        };

        ToolCallRecord {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
        }
    }
}

/// Outcome of a research run.
#[derive(Debug)]
pub struct ResearchReport {
    pub facts: FactSet,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model calls used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
