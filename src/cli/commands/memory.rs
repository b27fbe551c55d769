//! Memory command implementation.

use crate::cli::{MemoryAction, Output};
use crate::config::Settings;
use crate::memory::{JsonWeaknessStore, QuizResult, WeaknessStore};
use anyhow::Result;

/// Run the memory command.
pub async fn run_memory(action: &MemoryAction, settings: Settings) -> Result<()> {
    let store = JsonWeaknessStore::new(settings.memory_dir());

    match action {
        MemoryAction::Show { user } => {
            let profile = store.get_profile(user).await;

            Output::header(&format!("Profile: {}", user));
            Output::kv(
                "Last session",
                &profile
                    .last_session_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            );

            Output::header("Weaknesses");
            if profile.weaknesses.is_empty() {
                Output::info("None recorded.");
            }
            for weakness in &profile.weaknesses {
                Output::list_item(weakness);
            }

            Output::header("Topics studied");
            if profile.topics_studied.is_empty() {
                Output::info("None recorded.");
            }
            for topic in &profile.topics_studied {
                Output::list_item(topic);
            }

            Output::header("Quiz history");
            if profile.quiz_history.is_empty() {
                Output::info("No quizzes recorded.");
            }
            for result in &profile.quiz_history {
                Output::list_item(&format!(
                    "{}/{} on {} ({})",
                    result.score,
                    result.total,
                    result.topic,
                    result.completed_at.format("%Y-%m-%d %H:%M")
                ));
            }
        }

        MemoryAction::Record { score, total, topic, user } => {
            let history = store
                .record_quiz_result(user, QuizResult::new(*score, *total, topic.clone()))
                .await?;
            Output::success(&format!(
                "Recorded {}/{} on {} for {} ({} quizzes so far)",
                score,
                total,
                topic,
                user,
                history.len()
            ));
        }

        MemoryAction::Weaknesses { weaknesses, user } => {
            let merged = store.update_weaknesses(user, weaknesses).await?;
            Output::success(&format!("{} now has {} weakness(es)", user, merged.len()));
            for weakness in &merged {
                Output::list_item(weakness);
            }
        }
    }

    Ok(())
}
