//! Tool definitions and implementations for the research agent.

use crate::error::{QuizError, Result};
use crate::model::ToolSpec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result returned by a search with no matching line.
pub const NO_MATCHES: &str = "No matches found.";

/// Maximum number of lines a search returns.
pub const MAX_SEARCH_LINES: usize = 5;

/// Available tools for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolCall {
    /// Keyword search over the source document.
    SearchDocument { query: String },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::SearchDocument { .. } => "search_document",
        }
    }
}

impl std::fmt::Display for ToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolCall::SearchDocument { query } => write!(f, "search_document({:?})", query),
        }
    }
}

/// Bounded keyword retrieval over one document.
#[derive(Debug, Clone)]
pub struct DocumentSearch {
    document: Arc<str>,
}

impl DocumentSearch {
    pub fn new(document: impl Into<Arc<str>>) -> Self {
        Self {
            document: document.into(),
        }
    }

    /// Case-insensitive substring match over the document's lines.
    ///
    /// Returns up to [`MAX_SEARCH_LINES`] matching lines joined by newlines,
    /// or [`NO_MATCHES`] when nothing matches.
    pub fn search(&self, query: &str) -> String {
        self.search_with_count(query).0
    }

    /// Like [`search`](Self::search), also returning the total match count.
    pub fn search_with_count(&self, query: &str) -> (String, usize) {
        let needle = query.to_lowercase();
        let matches: Vec<&str> = self
            .document
            .lines()
            .filter(|line| line.to_lowercase().contains(&needle))
            .collect();

        if matches.is_empty() {
            return (NO_MATCHES.to_string(), 0);
        }

        let shown = matches
            .iter()
            .take(MAX_SEARCH_LINES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        (shown, matches.len())
    }
}

/// Tool execution context for one document.
pub struct ToolContext {
    pub search: DocumentSearch,
}

impl ToolContext {
    pub fn new(document: impl Into<Arc<str>>) -> Self {
        Self {
            search: DocumentSearch::new(document),
        }
    }

    /// Execute a tool call, returning its output and the number of hits.
    pub fn execute(&self, tool: &ToolCall) -> (String, usize) {
        match tool {
            ToolCall::SearchDocument { query } => self.search.search_with_count(query),
        }
    }
}

/// Tool definitions offered to the model.
pub fn tool_definitions() -> Vec<ToolSpec> {
    vec![ToolSpec {
        name: "search_document".to_string(),
        description: "Search the document for keywords to find relevant facts. \
            Returns up to 5 matching lines."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The keyword to search for"
                }
            },
            "required": ["query"]
        }),
    }]
}

/// Parse a tool call from the model's name and JSON arguments.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| QuizError::InvalidInput(format!("Invalid tool arguments: {}", e)))?;

    match name {
        "search_document" => {
            let query = args["query"]
                .as_str()
                .ok_or_else(|| QuizError::InvalidInput("Missing 'query' argument".to_string()))?
                .to_string();
            Ok(ToolCall::SearchDocument { query })
        }
        _ => Err(QuizError::InvalidInput(format!("Unknown tool: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "The sky is blue.\nWater boils at 100C.\nThe SKY at night is dark.";

    #[test]
    fn test_search_is_case_insensitive() {
        let search = DocumentSearch::new(DOC);
        assert_eq!(search.search("sky"), "The sky is blue.\nThe SKY at night is dark.");
    }

    #[test]
    fn test_search_no_matches_sentinel() {
        let search = DocumentSearch::new(DOC);
        assert_eq!(search.search("volcano"), NO_MATCHES);
        assert_eq!(search.search_with_count("volcano").1, 0);
    }

    #[test]
    fn test_search_caps_results() {
        let doc = (0..12).map(|i| format!("line {} about rust", i)).collect::<Vec<_>>().join("\n");
        let (result, total) = DocumentSearch::new(doc).search_with_count("RUST");
        assert_eq!(result.lines().count(), MAX_SEARCH_LINES);
        assert_eq!(total, 12);
        assert!(result.starts_with("line 0 about rust"));
    }

    #[test]
    fn test_parse_search_tool() {
        let tool = parse_tool_call("search_document", r#"{"query": "boils"}"#).unwrap();
        assert_eq!(tool, ToolCall::SearchDocument { query: "boils".to_string() });
        assert_eq!(tool.to_string(), r#"search_document("boils")"#);
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(parse_tool_call("get_transcript", "{}").is_err());
        assert!(parse_tool_call("search_document", "{}").is_err());
        assert!(parse_tool_call("search_document", "not json").is_err());
    }

    #[test]
    fn test_tool_definitions_match_parser() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, ToolCall::SearchDocument { query: String::new() }.name());
    }
}
