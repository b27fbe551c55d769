//! Per-user weakness memory.
//!
//! Profiles survive restarts and bias future research toward what a user
//! has struggled with.

mod json;

pub use json::JsonWeaknessStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything remembered about one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeaknessProfile {
    pub weaknesses: BTreeSet<String>,
    pub topics_studied: BTreeSet<String>,
    /// Append-only, in recording order.
    pub quiz_history: Vec<QuizResult>,
    pub last_session_at: Option<DateTime<Utc>>,
}

/// Outcome of one completed quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub topic: String,
    pub completed_at: DateTime<Utc>,
}

impl QuizResult {
    pub fn new(score: u32, total: u32, topic: impl Into<String>) -> Self {
        Self {
            score,
            total,
            topic: topic.into(),
            completed_at: Utc::now(),
        }
    }
}

/// Durable store of weakness profiles.
#[async_trait]
pub trait WeaknessStore: Send + Sync {
    /// Profile for `user_id`; an unknown or unreadable profile reads as empty.
    async fn get_profile(&self, user_id: &str) -> WeaknessProfile;

    /// Add a topic (set semantics) and refresh the session timestamp.
    async fn record_topic_studied(&self, user_id: &str, topic: &str) -> Result<()>;

    /// Append a result and return the full updated history.
    async fn record_quiz_result(&self, user_id: &str, result: QuizResult) -> Result<Vec<QuizResult>>;

    /// Union new weaknesses into the profile and return the updated set.
    async fn update_weaknesses(&self, user_id: &str, weaknesses: &[String]) -> Result<BTreeSet<String>>;
}

/// A timestamp that is strictly later than `after`, even if the clock is not.
pub(crate) fn timestamp_after(after: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match after {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}
