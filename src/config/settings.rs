//! Configuration settings for Quizwright.

use crate::quiz::QuestionKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub research: ResearchSettings,
    pub generation: GenerationSettings,
    pub memory: MemorySettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.quizwright".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Model backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model used when a request does not name one.
    pub model: String,
    /// Alternative OpenAI-compatible endpoint.
    pub api_base: Option<String>,
    /// Timeout for a single model call, in seconds.
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
            temperature: 0.7,
        }
    }
}

/// Research stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    /// Model calls allowed before the researcher must answer without tools.
    pub max_iterations: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self { max_iterations: 6 }
    }
}

/// How many questions of one kind a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: QuestionKind,
    pub count: u32,
}

/// One parallel generation branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSettings {
    pub questions: Vec<KindCount>,
}

impl TaskSettings {
    pub fn single(kind: QuestionKind, count: u32) -> Self {
        Self {
            questions: vec![KindCount { kind, count }],
        }
    }
}

/// Parallel generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Task partition; kinds must not repeat across tasks.
    pub tasks: Vec<TaskSettings>,
    /// Maximum tasks in flight (0 = all at once).
    pub max_concurrent: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tasks: vec![
                TaskSettings::single(QuestionKind::MultipleChoice, 3),
                TaskSettings::single(QuestionKind::TrueFalse, 1),
                TaskSettings::single(QuestionKind::FillBlank, 1),
            ],
            max_concurrent: 0,
        }
    }
}

/// Weakness memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Directory holding one profile file per user.
    pub dir: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            dir: "~/.quizwright/memory".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::QuizError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizwright")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded memory directory path.
    pub fn memory_dir(&self) -> PathBuf {
        Self::expand_path(&self.memory.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_partition() {
        let settings = Settings::default();
        let counts: Vec<_> = settings
            .generation
            .tasks
            .iter()
            .flat_map(|t| t.questions.iter().map(|q| (q.kind, q.count)))
            .collect();
        assert_eq!(
            counts,
            vec![
                (QuestionKind::MultipleChoice, 3),
                (QuestionKind::TrueFalse, 1),
                (QuestionKind::FillBlank, 1)
            ]
        );
    }

    #[test]
    fn test_parse_partial_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [model]
            model = "gpt-4.1"

            [[generation.tasks]]
            questions = [{ kind = "matching", count = 2 }, { kind = "ordering", count = 1 }]
            "#,
        )
        .unwrap();
        assert_eq!(settings.model.model, "gpt-4.1");
        assert_eq!(settings.model.timeout_secs, crate::openai::DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.generation.tasks.len(), 1);
        assert_eq!(settings.generation.tasks[0].questions[1].kind, QuestionKind::Ordering);
        assert_eq!(settings.server.port, 3001);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut settings = Settings::default();
        settings.research.max_iterations = 3;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.research.max_iterations, 3);
        assert_eq!(loaded.generation.tasks, settings.generation.tasks);
    }
}
