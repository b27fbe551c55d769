//! Recovery of structured questions from free-form model output.
//!
//! Models wrap JSON in code fences, prepend chatter, or emit trailing notes.
//! Recovery peels those layers off in a fixed order and then checks every
//! question on its own, so one malformed entry never sinks the whole array.

use crate::error::{QuizError, Result};
use crate::quiz::Question;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Characters of raw output kept in a recovery error.
pub const PREVIEW_CHARS: usize = 150;

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("valid fence regex"))
}

fn greedy_array() -> &'static Regex {
    static ARRAY: OnceLock<Regex> = OnceLock::new();
    ARRAY.get_or_init(|| Regex::new(r"\[\s*\{[\s\S]*\}\s*\]").expect("valid array regex"))
}

fn lazy_array() -> &'static Regex {
    static ARRAY: OnceLock<Regex> = OnceLock::new();
    ARRAY.get_or_init(|| Regex::new(r"\[\s*\{[\s\S]*?\}\s*\]").expect("valid array regex"))
}

/// Questions recovered from one model response.
#[derive(Debug, Clone)]
pub struct Recovered {
    /// Structurally valid questions, in response order.
    pub questions: Vec<Question>,
    /// Why each dropped entry was rejected.
    pub dropped: Vec<String>,
}

/// Recover a question array from raw model text.
///
/// Fails with `Recovery` when no JSON array can be found or when not a
/// single entry passes its kind's structural contract.
pub fn recover_questions(raw: &str) -> Result<Recovered> {
    let entries = extract_array(raw).ok_or_else(|| recovery_error("no JSON array found", raw))?;

    let mut questions = Vec::with_capacity(entries.len());
    let mut dropped = Vec::new();

    for (idx, entry) in entries.into_iter().enumerate() {
        match Question::from_value(entry) {
            Ok(question) => questions.push(question),
            Err(e) => {
                debug!("Dropping question {}: {}", idx, e);
                dropped.push(format!("#{}: {}", idx, e));
            }
        }
    }

    if !dropped.is_empty() {
        warn!("Dropped {} malformed question(s)", dropped.len());
    }

    if questions.is_empty() {
        return Err(recovery_error("no structurally valid questions", raw));
    }

    Ok(Recovered { questions, dropped })
}

/// Strip fences, slice to the outermost brackets, then parse; on failure
/// fall back to searching for an array-of-objects inside the slice.
fn extract_array(raw: &str) -> Option<Vec<Value>> {
    let unfenced = code_fence().replace_all(raw, "");
    let trimmed = unfenced.trim();

    let sliced = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };

    if let Ok(entries) = serde_json::from_str::<Vec<Value>>(sliced) {
        return Some(entries);
    }

    greedy_array()
        .find(sliced)
        .into_iter()
        .chain(lazy_array().find_iter(sliced))
        .find_map(|m| serde_json::from_str::<Vec<Value>>(m.as_str()).ok())
}

fn recovery_error(reason: &str, raw: &str) -> QuizError {
    QuizError::Recovery {
        reason: reason.to_string(),
        preview: preview(raw),
    }
}

/// First `PREVIEW_CHARS` characters of `raw`.
pub fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionKind;

    const TWO_QUESTIONS: &str = r#"[
        {"type": "multiple-choice", "question": "Sky colour?", "options": ["Blue", "Red"], "correctIndex": 0},
        {"type": "true-false", "question": "Water boils at 100C.", "correctAnswer": true}
    ]"#;

    #[test]
    fn test_plain_array() {
        let recovered = recover_questions(TWO_QUESTIONS).unwrap();
        assert_eq!(recovered.questions.len(), 2);
        assert!(recovered.dropped.is_empty());
    }

    #[test]
    fn test_fenced_array_with_chatter() {
        let raw = format!("Here is your quiz:\n```json\n{}\n```\nGood luck!", TWO_QUESTIONS);
        let recovered = recover_questions(&raw).unwrap();
        assert_eq!(recovered.questions[1].kind(), QuestionKind::TrueFalse);
    }

    #[test]
    fn test_regex_fallback_skips_bracketed_prose() {
        let raw = format!("Note [draft] follows: {} (end)", TWO_QUESTIONS);
        let recovered = recover_questions(&raw).unwrap();
        assert_eq!(recovered.questions.len(), 2);
    }

    #[test]
    fn test_malformed_entries_dropped_individually() {
        let raw = r#"[
            {"type": "multiple-choice", "question": "Only one option?", "options": ["A"], "correctIndex": 0},
            {"type": "fill-blank", "question": "Ice is ___.", "correctAnswer": "cold", "acceptableAnswers": ["cold"]},
            {"type": "essay", "question": "Discuss."}
        ]"#;
        let recovered = recover_questions(raw).unwrap();
        assert_eq!(recovered.questions.len(), 1);
        assert_eq!(recovered.dropped.len(), 2);
        assert!(recovered.dropped[1].contains("Unsupported question type"));
    }

    #[test]
    fn test_unparsable_text_fails_with_bounded_preview() {
        let raw = "I'm sorry, I cannot produce a quiz. ".repeat(20);
        let err = recover_questions(&raw).unwrap_err();
        match err {
            QuizError::Recovery { preview, .. } => {
                assert_eq!(preview.chars().count(), PREVIEW_CHARS);
                assert!(raw.starts_with(&preview));
            }
            other => panic!("Expected Recovery error, got {:?}", other),
        }
    }

    #[test]
    fn test_all_invalid_fails() {
        let err = recover_questions(r#"[{"type": "true-false", "question": "No answer"}]"#).unwrap_err();
        assert!(matches!(err, QuizError::Recovery { .. }));
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let first = recover_questions(TWO_QUESTIONS).unwrap().questions;
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = recover_questions(&reserialized).unwrap().questions;
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_covers_every_kind() {
        let raw = r#"[
            {"type": "multiple-choice", "question": "Sky colour?", "options": ["Blue", "Red", "Green"], "correctIndex": 2},
            {"type": "true-false", "question": "Ice floats.", "correctAnswer": false},
            {"type": "fill-blank", "question": "Water is _____.", "correctAnswer": "wet", "acceptableAnswers": ["wet", "damp"]},
            {"type": "fill-blank", "question": "_____ is a planet.", "correctAnswer": "Mars", "acceptableAnswers": ["Mars"], "caseSensitive": true},
            {"type": "matching", "question": "Match capitals.", "pairs": [{"left": "France", "right": "Paris"}, {"left": "Japan", "right": "Tokyo"}]},
            {"type": "ordering", "question": "Order the steps.", "items": ["Rinse", "Wash", "Dry"], "correctOrder": [1, 0, 2]}
        ]"#;

        let first = recover_questions(raw).unwrap();
        assert!(first.dropped.is_empty());
        assert_eq!(first.questions.len(), 6);

        let reserialized = serde_json::to_string(&first.questions).unwrap();
        // An absent caseSensitive stays absent rather than becoming false.
        assert_eq!(reserialized.matches("caseSensitive").count(), 1);

        let second = recover_questions(&reserialized).unwrap().questions;
        assert_eq!(first.questions, second);
        let kinds: Vec<_> = second.iter().map(|q| q.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                QuestionKind::MultipleChoice,
                QuestionKind::TrueFalse,
                QuestionKind::FillBlank,
                QuestionKind::FillBlank,
                QuestionKind::Matching,
                QuestionKind::Ordering,
            ]
        );
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let raw = "é".repeat(300);
        assert_eq!(preview(&raw).chars().count(), PREVIEW_CHARS);
    }
}
