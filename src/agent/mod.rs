//! Agents of the quiz pipeline.
//!
//! The researcher runs a tool-use loop over the document and states a small
//! set of facts; the examiners turn those facts into questions in parallel.

mod examiner;
mod researcher;
mod tools;

pub use examiner::{Examiners, GenerationOutcome, GenerationPlan, GenerationTask, TaskReport, GENERATOR};
pub use researcher::{merge_weaknesses, research_focus, ResearchReport, Researcher, ToolCallRecord, RESEARCHER};
pub use tools::{parse_tool_call, tool_definitions, DocumentSearch, ToolCall, ToolContext, MAX_SEARCH_LINES, NO_MATCHES};
