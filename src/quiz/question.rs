//! Question kinds and their structural contracts.

use crate::error::{QuizError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Matching,
    Ordering,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 5] = [
        QuestionKind::MultipleChoice,
        QuestionKind::TrueFalse,
        QuestionKind::FillBlank,
        QuestionKind::Matching,
        QuestionKind::Ordering,
    ];

    /// Wire name, as used in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::FillBlank => "fill-blank",
            QuestionKind::Matching => "matching",
            QuestionKind::Ordering => "ordering",
        }
    }

    /// Example object shown to the model for this kind.
    pub fn example(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => {
                r#"{"type": "multiple-choice", "question": "Question text?", "options": ["A", "B", "C", "D"], "correctIndex": 0}"#
            }
            QuestionKind::TrueFalse => {
                r#"{"type": "true-false", "question": "Statement to verify.", "correctAnswer": true}"#
            }
            QuestionKind::FillBlank => {
                r#"{"type": "fill-blank", "question": "Text with _____ blank.", "correctAnswer": "answer", "acceptableAnswers": ["answer", "Answer"], "caseSensitive": false}"#
            }
            QuestionKind::Matching => {
                r#"{"type": "matching", "question": "Match each term to its definition.", "pairs": [{"left": "Term", "right": "Definition"}, {"left": "Other", "right": "Meaning"}]}"#
            }
            QuestionKind::Ordering => {
                r#"{"type": "ordering", "question": "Put these steps in order.", "items": ["First", "Second", "Third"], "correctOrder": [0, 1, 2]}"#
            }
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionKind {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self> {
        QuestionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| QuizError::UnsupportedQuestion(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoice {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalse {
    pub question: String,
    pub correct_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlank {
    pub question: String,
    pub correct_answer: String,
    pub acceptable_answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    pub question: String,
    pub pairs: Vec<MatchPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ordering {
    pub question: String,
    pub items: Vec<String>,
    /// Item indices in their correct sequence.
    pub correct_order: Vec<usize>,
}

/// A quiz question, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Question {
    MultipleChoice(MultipleChoice),
    TrueFalse(TrueFalse),
    FillBlank(FillBlank),
    Matching(Matching),
    Ordering(Ordering),
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self {
            Question::MultipleChoice(_) => QuestionKind::MultipleChoice,
            Question::TrueFalse(_) => QuestionKind::TrueFalse,
            Question::FillBlank(_) => QuestionKind::FillBlank,
            Question::Matching(_) => QuestionKind::Matching,
            Question::Ordering(_) => QuestionKind::Ordering,
        }
    }

    /// The question text shown to the learner.
    pub fn text(&self) -> &str {
        match self {
            Question::MultipleChoice(q) => &q.question,
            Question::TrueFalse(q) => &q.question,
            Question::FillBlank(q) => &q.question,
            Question::Matching(q) => &q.question,
            Question::Ordering(q) => &q.question,
        }
    }

    /// Single-option placeholder shown when no question could be generated.
    pub fn retry_notice() -> Self {
        Question::MultipleChoice(MultipleChoice {
            question: "Error generating questions...".to_string(),
            options: vec!["Retry".to_string()],
            correct_index: 0,
        })
    }

    /// Check the kind-specific structural contract.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.text().trim().is_empty() {
            return Err("question text is empty".to_string());
        }

        match self {
            Question::MultipleChoice(q) => {
                if q.options.len() < 2 {
                    return Err(format!("needs at least 2 options, got {}", q.options.len()));
                }
                if q.correct_index >= q.options.len() {
                    return Err(format!(
                        "correctIndex {} out of range for {} options",
                        q.correct_index,
                        q.options.len()
                    ));
                }
            }
            Question::TrueFalse(_) => {}
            Question::FillBlank(q) => {
                if q.acceptable_answers.is_empty() {
                    return Err("needs at least one acceptable answer".to_string());
                }
            }
            Question::Matching(q) => {
                if q.pairs.len() < 2 {
                    return Err(format!("needs at least 2 pairs, got {}", q.pairs.len()));
                }
                if q
                    .pairs
                    .iter()
                    .any(|p| p.left.trim().is_empty() || p.right.trim().is_empty())
                {
                    return Err("every pair needs a left and a right side".to_string());
                }
            }
            Question::Ordering(q) => {
                if q.items.len() < 2 {
                    return Err(format!("needs at least 2 items, got {}", q.items.len()));
                }
                if q.items.len() != q.correct_order.len() {
                    return Err("correctOrder length differs from items".to_string());
                }
                let mut seen = vec![false; q.items.len()];
                for &idx in &q.correct_order {
                    match seen.get_mut(idx) {
                        Some(slot) if !*slot => *slot = true,
                        _ => return Err(format!("correctOrder is not a permutation ({})", idx)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Parse and validate one question object from model output.
    ///
    /// Objects without a `type` field get their kind inferred from their shape.
    pub fn from_value(mut value: Value) -> Result<Self> {
        let object = value
            .as_object_mut()
            .ok_or_else(|| QuizError::InvalidInput("question is not a JSON object".to_string()))?;

        let kind = match object.get("type") {
            Some(Value::String(name)) => name.parse::<QuestionKind>()?,
            Some(other) => return Err(QuizError::UnsupportedQuestion(other.to_string())),
            None => {
                let kind = infer_kind(object);
                object.insert("type".to_string(), Value::String(kind.as_str().to_string()));
                kind
            }
        };

        let question: Question = serde_json::from_value(value)
            .map_err(|e| QuizError::InvalidInput(format!("malformed {} question: {}", kind, e)))?;

        question
            .validate()
            .map_err(|reason| QuizError::InvalidInput(format!("invalid {} question: {}", kind, reason)))?;

        Ok(question)
    }
}

/// Guess the kind of an untyped question from the fields it carries.
fn infer_kind(object: &serde_json::Map<String, Value>) -> QuestionKind {
    if matches!(object.get("correctAnswer"), Some(Value::Bool(_))) {
        QuestionKind::TrueFalse
    } else if object.get("acceptableAnswers").is_some_and(Value::is_array) {
        QuestionKind::FillBlank
    } else if object.get("pairs").is_some_and(Value::is_array) {
        QuestionKind::Matching
    } else if object.get("correctOrder").is_some_and(Value::is_array) {
        QuestionKind::Ordering
    } else {
        QuestionKind::MultipleChoice
    }
}
