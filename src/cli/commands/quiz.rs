//! Quiz command implementation.

use crate::approval::{ApprovalGate, ConsoleApproval};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::QuizError;
use crate::events::ProgressSink;
use crate::memory::JsonWeaknessStore;
use crate::model::OpenAIProvider;
use crate::orchestrator::{DocumentInput, Pipeline, QuizRequest, Stage};
use crate::quiz::FactSet;
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine as _;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

/// Image formats sent to the model as inline blobs.
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Run the quiz command.
#[allow(clippy::too_many_arguments)]
pub async fn run_quiz(
    input: &str,
    yes: bool,
    weaknesses: Vec<String>,
    user: &str,
    model: Option<String>,
    output: Option<String>,
    api_key: Option<String>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Quiz, &settings, api_key.as_deref())
        .and_then(|_| preflight::check_document_source(input, yes))
    {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let document = load_document(input).await?;

    let provider = Arc::new(OpenAIProvider::new(settings.model.clone()));
    let store = Arc::new(JsonWeaknessStore::new(settings.memory_dir()));
    let pipeline = Pipeline::new(&settings, provider, store)?;

    let spinner = Arc::new(Mutex::new(Some(Output::spinner("Researching document..."))));
    let (events, mut rx) = ProgressSink::channel();
    let printer = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let line = Output::format_event(&event);
                match spinner.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
                    Some(pb) => pb.println(line),
                    None => eprintln!("{}", line),
                }
            }
        })
    };

    let gate = SpinnerGate {
        spinner: spinner.clone(),
        auto_approve: yes,
    };
    let request = QuizRequest {
        credential: api_key,
        model_id: model.unwrap_or_default(),
        document,
        weaknesses,
        user_id: user.to_string(),
    };

    let result = pipeline.run(request, &gate, &events).await;

    // Let the printer flush what is left before the summary.
    drop(events);
    let _ = printer.await;
    if let Some(pb) = spinner.lock().unwrap_or_else(|e| e.into_inner()).take() {
        pb.finish_and_clear();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            Output::error(&format!("Quiz generation failed: {}", e));
            return Err(e.into());
        }
    };

    match (outcome.stage(), outcome.quiz()) {
        (Stage::Assembled, Some(quiz)) => {
            Output::header(&format!("Quiz ({} questions)", quiz.len()));
            for (i, question) in quiz.questions.iter().enumerate() {
                Output::question(i + 1, question);
            }
            println!();

            if outcome.degraded {
                Output::warning("Every examiner failed; the quiz is a placeholder. Try again.");
            }

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(quiz)?;
                tokio::fs::write(&path, json).await?;
                Output::success(&format!("Quiz written to {}", path));
            }
            Output::kv("Session", &outcome.session.id.to_string());
        }
        _ => {
            Output::warning("Facts not approved; no quiz was generated.");
        }
    }

    Ok(())
}

/// Console approval that hides the spinner while asking.
struct SpinnerGate {
    spinner: Arc<Mutex<Option<ProgressBar>>>,
    auto_approve: bool,
}

#[async_trait]
impl ApprovalGate for SpinnerGate {
    async fn review(&self, facts: &FactSet) -> bool {
        let paused = self.spinner.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(pb) = paused {
            pb.finish_and_clear();
        }

        let approved = if self.auto_approve {
            Output::header("Extracted facts");
            for fact in facts.facts() {
                Output::list_item(fact);
            }
            true
        } else {
            ConsoleApproval.review(facts).await
        };

        if approved {
            *self.spinner.lock().unwrap_or_else(|e| e.into_inner()) =
                Some(Output::spinner("Generating questions..."));
        }
        approved
    }
}

/// Read the document named on the command line.
async fn load_document(input: &str) -> Result<DocumentInput> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(DocumentInput::text(text));
    }

    let path = Path::new(input);
    if !path.exists() {
        return Err(QuizError::InvalidInput(format!("File not found: {}", input)).into());
    }

    match image_mime_type(path) {
        Some(mime_type) => {
            let bytes = tokio::fs::read(path).await?;
            Ok(DocumentInput::Inline {
                base64: base64::engine::general_purpose::STANDARD.encode(bytes),
                mime_type,
                format: "image".to_string(),
            })
        }
        None => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                QuizError::InvalidInput(format!("{} is not a readable text file: {}", input, e))
            })?;
            Ok(DocumentInput::text(text))
        }
    }
}

/// MIME type for image files, judged by extension.
fn image_mime_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let subtype = if ext == "jpg" { "jpeg" } else { ext.as_str() };
    Some(format!("image/{}", subtype))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Path::new("a/diagram.JPG")).as_deref(), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("chart.webp")).as_deref(), Some("image/webp"));
        assert_eq!(image_mime_type(Path::new("notes.txt")), None);
        assert_eq!(image_mime_type(Path::new("README")), None);
    }

    #[tokio::test]
    async fn test_load_text_and_image() {
        let dir = tempfile::tempdir().unwrap();
        let text_path = dir.path().join("notes.md");
        std::fs::write(&text_path, "The sky is blue.").unwrap();
        let image_path = dir.path().join("pic.png");
        std::fs::write(&image_path, b"hi").unwrap();

        let text = load_document(text_path.to_str().unwrap()).await.unwrap();
        assert_eq!(text, DocumentInput::text("The sky is blue."));

        let image = load_document(image_path.to_str().unwrap()).await.unwrap();
        assert_eq!(
            image,
            DocumentInput::Inline {
                base64: "aGk=".to_string(),
                mime_type: "image/png".to_string(),
                format: "image".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        assert!(load_document("/definitely/not/here.txt").await.is_err());
    }
}
