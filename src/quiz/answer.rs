//! Answer checking for finished quizzes.

use super::question::Question;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A learner's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Boolean(bool),
    Choice(usize),
    Order(Vec<usize>),
    /// Left pair index -> chosen right pair index.
    Matches(BTreeMap<usize, usize>),
    Text(String),
}

impl Question {
    /// Whether `answer` is correct. Answers of the wrong shape are simply wrong.
    pub fn check_answer(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (Question::MultipleChoice(q), Answer::Choice(idx)) => *idx == q.correct_index,
            (Question::TrueFalse(q), Answer::Boolean(value)) => *value == q.correct_answer,
            (Question::FillBlank(q), Answer::Text(text)) => {
                let case_sensitive = q.case_sensitive.unwrap_or(true);
                let normalize = |s: &str| {
                    if case_sensitive {
                        s.trim().to_string()
                    } else {
                        s.trim().to_lowercase()
                    }
                };
                let given = normalize(text);
                q.acceptable_answers.iter().any(|a| normalize(a) == given)
            }
            (Question::Matching(q), Answer::Matches(matches)) => {
                matches.len() == q.pairs.len()
                    && (0..q.pairs.len()).all(|left| matches.get(&left) == Some(&left))
            }
            (Question::Ordering(q), Answer::Order(order)) => *order == q.correct_order,
            _ => false,
        }
    }
}
