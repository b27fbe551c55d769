//! Weakness store backed by one JSON file per user.
//!
//! Every mutation re-reads the file, applies the change and atomically
//! replaces the file before returning.

use super::{timestamp_after, QuizResult, WeaknessProfile, WeaknessStore};
use crate::error::{QuizError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument, warn};

/// File-per-user profile store.
pub struct JsonWeaknessStore {
    dir: PathBuf,
    /// One write lock per user, so different users never wait on each other.
    /// Entries live only while a write holds or waits on them.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl JsonWeaknessStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the profile file for `user_id`.
    pub fn profile_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("user-{}.json", file_stem(user_id)))
    }

    fn lock_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Forget the user's lock once no other write holds or waits on it.
    fn release(&self, user_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Clones are only taken under this mutex, so the map and `lock` are the last holders.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
    }

    /// Read a profile; a missing or corrupt file reads as empty.
    async fn load(&self, user_id: &str) -> Result<WeaknessProfile> {
        let path = self.profile_path(user_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WeaknessProfile::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!("Ignoring unreadable profile {}: {}", path.display(), e);
                Ok(WeaknessProfile::default())
            }
        }
    }

    /// Read, modify and atomically persist one user's profile.
    async fn update<T, F>(&self, user_id: &str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut WeaknessProfile) -> T,
    {
        let lock = self.lock_for(user_id);
        let output = {
            let _guard = lock.lock().await;
            self.apply_and_persist(user_id, apply).await
        };
        self.release(user_id, lock);
        output
    }

    async fn apply_and_persist<T, F>(&self, user_id: &str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut WeaknessProfile) -> T,
    {
        let mut profile = self.load(user_id).await?;
        let output = apply(&mut profile);

        let dir = self.dir.clone();
        let path = self.profile_path(user_id);
        let content = serde_json::to_vec_pretty(&profile)?;
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &content))
            .await
            .map_err(|e| QuizError::Memory(format!("profile write task failed: {}", e)))??;

        debug!("Persisted profile for {}", user_id);
        Ok(output)
    }
}

#[async_trait]
impl WeaknessStore for JsonWeaknessStore {
    #[instrument(skip(self))]
    async fn get_profile(&self, user_id: &str) -> WeaknessProfile {
        match self.load(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Could not read profile for {}: {}", user_id, e);
                WeaknessProfile::default()
            }
        }
    }

    #[instrument(skip(self))]
    async fn record_topic_studied(&self, user_id: &str, topic: &str) -> Result<()> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(QuizError::InvalidInput("topic must not be empty".to_string()));
        }

        self.update(user_id, |profile| {
            profile.topics_studied.insert(topic.to_string());
            profile.last_session_at = Some(timestamp_after(profile.last_session_at));
        })
        .await
    }

    #[instrument(skip(self, result), fields(score = result.score, total = result.total))]
    async fn record_quiz_result(&self, user_id: &str, mut result: QuizResult) -> Result<Vec<QuizResult>> {
        if result.score > result.total {
            return Err(QuizError::InvalidInput(format!(
                "score {} exceeds total {}",
                result.score, result.total
            )));
        }

        self.update(user_id, move |profile| {
            if let Some(last) = profile.quiz_history.last() {
                if result.completed_at <= last.completed_at {
                    result.completed_at = timestamp_after(Some(last.completed_at));
                }
            }
            profile.last_session_at = Some(timestamp_after(profile.last_session_at));
            profile.quiz_history.push(result);
            profile.quiz_history.clone()
        })
        .await
    }

    #[instrument(skip(self, weaknesses), fields(count = weaknesses.len()))]
    async fn update_weaknesses(&self, user_id: &str, weaknesses: &[String]) -> Result<BTreeSet<String>> {
        let additions: Vec<String> = weaknesses
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        self.update(user_id, move |profile| {
            profile.weaknesses.extend(additions);
            profile.weaknesses.clone()
        })
        .await
    }
}

/// Map a user id onto a safe, collision-free file stem.
fn file_stem(user_id: &str) -> String {
    let mut stem = String::with_capacity(user_id.len());
    for byte in user_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("~{:02x}", byte));
        }
    }
    stem
}

/// Write to a temp file in the same directory, then rename over the target.
fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    file.persist(path)
        .map_err(|e| QuizError::Memory(format!("could not replace {}: {}", path.display(), e)))?;
    Ok(())
}
