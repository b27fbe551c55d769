//! Quiz data model: fact sets, questions and assembled quizzes.

mod answer;
mod question;

pub use answer::Answer;
pub use question::{
    FillBlank, MatchPair, Matching, MultipleChoice, Ordering, Question, QuestionKind, TrueFalse,
};

use crate::error::{QuizError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Number of facts the research stage aims for.
pub const FACT_TARGET: usize = 5;

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^(?:\d+\s*[.):]|[-*•])(?:\s+|$)").expect("valid list marker regex"))
}

/// Ordered list of short factual statements bridging research and generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactSet {
    facts: Vec<String>,
}

impl FactSet {
    /// Normalize free-form model output into at most `FACT_TARGET` facts.
    ///
    /// List markers are stripped and blank lines dropped. Output that leaves
    /// no fact at all is an error, never an empty fact set.
    pub fn from_model_output(text: &str) -> Result<Self> {
        let facts: Vec<String> = text
            .lines()
            .map(|line| list_marker().replace(line.trim(), "").trim().to_string())
            .filter(|line| !line.is_empty())
            .take(FACT_TARGET)
            .collect();

        if facts.is_empty() {
            return Err(QuizError::ResearchIncomplete(
                "model produced no usable facts".to_string(),
            ));
        }

        Ok(Self { facts })
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Render as a numbered list for prompts and review.
    pub fn numbered(&self) -> String {
        self.facts
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{}. {}", i + 1, f))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ordered sequence of questions handed to the quiz-taking component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quiz {
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Degraded quiz returned when no generation task produced anything.
    pub fn fallback() -> Self {
        Self::new(vec![Question::retry_notice()])
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Count questions of one kind.
    pub fn count_kind(&self, kind: QuestionKind) -> usize {
        self.questions.iter().filter(|q| q.kind() == kind).count()
    }
}
