//! Prompt templates for Quizwright.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub research: ResearchPrompts,
    pub generation: GenerationPrompts,
    pub extraction: ExtractionPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for the research loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchPrompts {
    pub system: String,
    pub user: String,
    /// Sent when the iteration budget is spent and tools are withdrawn.
    pub finalize: String,
}

impl Default for ResearchPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a diligent Researcher preparing material for a study quiz.

You have a 'search_document' tool that returns the document lines containing a keyword.
Use it to confirm details before stating them. Never state a fact the document does not support.

When you are done, output ONLY a numbered list of {{fact_count}} facts, nothing else.
Example:
1. Fact one
2. Fact two
3. Fact three
4. Fact four
5. Fact five"#
                .to_string(),

            user: r#"Extract {{fact_count}} key facts from the following document about: {{focus}}.

DOCUMENT:
{{document}}"#
                .to_string(),

            finalize: r#"You have used all your searches. Answer now with the numbered list of {{fact_count}} facts."#
                .to_string(),
        }
    }
}

/// Prompts for the per-kind examiners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    pub task: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            task: r#"You are an Examiner creating quiz questions.
Base every question strictly on these facts:
{{facts}}

Create exactly:
{{distribution}}

Output ONLY a valid JSON array (no markdown, no commentary). Use these shapes:
{{examples}}"#
                .to_string(),
        }
    }
}

/// Prompts for turning inline media into study text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompts {
    pub image: String,
    pub audio: String,
    pub video: String,
    pub fallback: String,
}

impl Default for ExtractionPrompts {
    fn default() -> Self {
        Self {
            image: r#"Analyze this image thoroughly and extract all information:
- Any text visible in the image (OCR)
- Diagrams, charts, and visual data
- Key concepts and relationships shown
- Important details and context

Format the output as clear, structured text that can be used to create educational quiz questions.
Be comprehensive and detailed."#
                .to_string(),

            audio: r#"Transcribe this audio file completely and accurately:
- All spoken words and dialogue
- Key topics and concepts discussed
- Important points and takeaways
- Context and background information

Format the output as clear, structured text suitable for creating quiz questions."#
                .to_string(),

            video: r#"Analyze this video comprehensively:
- Transcribe all spoken words and dialogue
- Describe visual elements, scenes, and demonstrations
- Extract any text visible in the video
- Identify key concepts and topics covered

Format the output as clear, structured text that can be used to create educational quiz questions."#
                .to_string(),

            fallback: "Extract and describe all content from this file in detail.".to_string(),
        }
    }
}

impl ExtractionPrompts {
    /// Prompt for a document format (`image`, `audio`, `video`, anything else).
    pub fn for_format(&self, format: &str) -> &str {
        match format.to_ascii_lowercase().as_str() {
            "image" => &self.image,
            "audio" => &self.audio,
            "video" => &self.video,
            _ => &self.fallback,
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let research_path = custom_path.join("research.toml");
            if research_path.exists() {
                let content = std::fs::read_to_string(&research_path)?;
                prompts.research = toml::from_str(&content)?;
            }

            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }

            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.research.user.contains("{{focus}}"));
        assert!(prompts.generation.task.contains("{{facts}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} facts.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        assert_eq!(Prompts::render(template, &vars), "Hello Alice, you have 5 facts.");
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("audience".to_string(), "students".to_string());
        prompts.variables.insert("focus".to_string(), "ignored".to_string());

        let mut vars = HashMap::new();
        vars.insert("focus".to_string(), "engines".to_string());

        let rendered = prompts.render_with_custom("{{focus}} for {{audience}}", &vars);
        assert_eq!(rendered, "engines for students");
    }

    #[test]
    fn test_custom_dir_overrides_research() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("research.toml"),
            "system = \"Be brief.\"\nuser = \"Facts about {{focus}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.research.system, "Be brief.");
        assert!(!prompts.research.finalize.is_empty());
        assert!(prompts.generation.task.contains("Examiner"));
    }

    #[test]
    fn test_extraction_prompt_by_format() {
        let prompts = ExtractionPrompts::default();
        assert!(prompts.for_format("IMAGE").contains("OCR"));
        assert_eq!(prompts.for_format("pdf"), prompts.fallback);
    }
}
