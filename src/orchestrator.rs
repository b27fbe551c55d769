//! Pipeline coordinator for Quizwright.
//!
//! Runs one document through research, approval and generation, owning the
//! session state for the whole run.

use crate::agent::{merge_weaknesses, research_focus, Examiners, GenerationPlan, Researcher, TaskReport};
use crate::approval::ApprovalGate;
use crate::config::{Prompts, Settings};
use crate::error::{QuizError, Result};
use crate::events::{EventKind, ProgressSink};
use crate::extract::ContentExtractor;
use crate::memory::WeaknessStore;
use crate::model::{InlineBlob, ModelClient, ModelProvider};
use crate::quiz::{FactSet, Quiz};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Event source name of the coordinator.
pub const COORDINATOR: &str = "Coordinator";

/// Longest topic recorded when it has to be derived from the document.
const TOPIC_CHARS: usize = 60;

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Researching,
    AwaitingApproval,
    Generating,
    Assembled,
    Aborted,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "INIT",
            Stage::Researching => "RESEARCHING",
            Stage::AwaitingApproval => "AWAITING_APPROVAL",
            Stage::Generating => "GENERATING",
            Stage::Assembled => "ASSEMBLED",
            Stage::Aborted => "ABORTED",
            Stage::Failed => "FAILED",
        }
    }

    /// Whether `next` directly follows this stage.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Init, Stage::Researching)
                | (Stage::Researching, Stage::AwaitingApproval)
                | (Stage::Researching, Stage::Failed)
                | (Stage::AwaitingApproval, Stage::Generating)
                | (Stage::AwaitingApproval, Stage::Aborted)
                | (Stage::Generating, Stage::Assembled)
                | (Stage::Generating, Stage::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Assembled | Stage::Aborted | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSession {
    pub id: Uuid,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    stage: Stage,
    /// Researched facts, held from AWAITING_APPROVAL on.
    facts: Option<FactSet>,
    /// The assembled quiz.
    quiz: Option<Quiz>,
    /// Message of the error that moved the session to FAILED.
    error: Option<String>,
}

impl PipelineSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            started_at: Utc::now(),
            stage: Stage::Init,
            facts: None,
            quiz: None,
            error: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn facts(&self) -> Option<&FactSet> {
        self.facts.as_ref()
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    /// Move to `next`, refusing anything but a forward edge of the state machine.
    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(QuizError::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            });
        }
        info!(session = %self.id, "{} -> {}", self.stage, next);
        self.stage = next;
        Ok(())
    }

    /// Hold the researched facts while they wait for review.
    pub fn await_approval(&mut self, facts: FactSet) -> Result<()> {
        self.advance(Stage::AwaitingApproval)?;
        self.facts = Some(facts);
        Ok(())
    }

    /// Hold the finished quiz.
    pub fn assemble(&mut self, quiz: Quiz) -> Result<()> {
        self.advance(Stage::Assembled)?;
        self.quiz = Some(quiz);
        Ok(())
    }

    /// Mark the run failed with the error that ended it.
    pub fn fail(&mut self, err: &QuizError) -> Result<()> {
        self.advance(Stage::Failed)?;
        self.error = Some(err.to_string());
        Ok(())
    }
}

/// Document handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentInput {
    Text {
        text: String,
    },
    Inline {
        base64: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(default)]
        format: String,
    },
}

impl DocumentInput {
    pub fn text(text: impl Into<String>) -> Self {
        DocumentInput::Text { text: text.into() }
    }
}

/// Everything one run needs from its caller.
#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub credential: Option<String>,
    /// Empty selects the configured default model.
    pub model_id: String,
    pub document: DocumentInput,
    /// Weaknesses named for this session only.
    pub weaknesses: Vec<String>,
    pub user_id: String,
}

/// Result of a run that did not fail.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// The finished session, ASSEMBLED or ABORTED.
    pub session: PipelineSession,
    /// True when generation fell back to the placeholder quiz.
    pub degraded: bool,
    pub reports: Vec<TaskReport>,
}

impl PipelineOutcome {
    pub fn stage(&self) -> Stage {
        self.session.stage()
    }

    /// None when the facts were not approved.
    pub fn quiz(&self) -> Option<&Quiz> {
        self.session.quiz()
    }
}

/// The quiz pipeline.
pub struct Pipeline {
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn WeaknessStore>,
    prompts: Prompts,
    plan: GenerationPlan,
    max_iterations: usize,
    max_concurrent: usize,
}

impl Pipeline {
    /// Build a pipeline from settings.
    pub fn new(
        settings: &Settings,
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn WeaknessStore>,
    ) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let plan = GenerationPlan::new(settings.generation.tasks.clone())?;

        Ok(Self::with_components(prompts, plan, provider, store)
            .with_max_iterations(settings.research.max_iterations)
            .with_max_concurrent(settings.generation.max_concurrent))
    }

    /// Build a pipeline from ready-made parts.
    pub fn with_components(
        prompts: Prompts,
        plan: GenerationPlan,
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn WeaknessStore>,
    ) -> Self {
        Self {
            provider,
            store,
            prompts,
            plan,
            max_iterations: 6,
            max_concurrent: 0,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Get the weakness store.
    pub fn store(&self) -> Arc<dyn WeaknessStore> {
        self.store.clone()
    }

    /// Run one document through the whole pipeline.
    ///
    /// Errors leave the session FAILED and are returned unchanged.
    #[instrument(skip(self, request, gate, events), fields(user = %request.user_id))]
    pub async fn run(
        &self,
        request: QuizRequest,
        gate: &dyn ApprovalGate,
        events: &ProgressSink,
    ) -> Result<PipelineOutcome> {
        let mut session = PipelineSession::new(request.user_id.clone());
        info!(session = %session.id, "Starting quiz pipeline");

        session.advance(Stage::Researching)?;
        let client = match self.provider.connect(request.credential.as_deref(), &request.model_id) {
            Ok(client) => client,
            Err(e) => return Err(self.fail(&mut session, e, events)),
        };

        let facts = match self.research(&client, &request, events).await {
            Ok(facts) => facts,
            Err(e) => return Err(self.fail(&mut session, e, events)),
        };

        session.await_approval(facts.clone())?;
        self.record_topic(&request, events).await;

        events.emit(COORDINATOR, EventKind::Info, "Waiting for approval of the facts");
        if !gate.review(&facts).await {
            session.advance(Stage::Aborted)?;
            events.emit(COORDINATOR, EventKind::Info, "Facts rejected, no quiz generated");
            return Ok(PipelineOutcome {
                session,
                degraded: false,
                reports: Vec::new(),
            });
        }

        session.advance(Stage::Generating)?;
        let examiners = Examiners::new(client, self.prompts.clone(), self.plan.clone())
            .with_max_concurrent(self.max_concurrent);
        let generated = match examiners.generate(&facts, events).await {
            Ok(generated) => generated,
            Err(e) => return Err(self.fail(&mut session, e, events)),
        };

        events.emit(
            COORDINATOR,
            EventKind::Done,
            format!("Quiz ready with {} question(s)", generated.quiz.len()),
        );
        session.assemble(generated.quiz)?;

        Ok(PipelineOutcome {
            session,
            degraded: generated.degraded,
            reports: generated.reports,
        })
    }

    /// Extract text if needed, then run the research loop.
    async fn research(
        &self,
        client: &Arc<dyn ModelClient>,
        request: &QuizRequest,
        events: &ProgressSink,
    ) -> Result<FactSet> {
        let document = match &request.document {
            DocumentInput::Text { text } => text.clone(),
            DocumentInput::Inline { base64, mime_type, format } => {
                let blob = InlineBlob::new(base64.clone(), mime_type.clone());
                ContentExtractor::new(client.clone(), self.prompts.extraction.clone())
                    .extract(&blob, format, events)
                    .await?
            }
        };
        if document.trim().is_empty() {
            return Err(QuizError::InvalidInput("document is empty".to_string()));
        }

        let profile = self.store.get_profile(&request.user_id).await;
        let weaknesses = merge_weaknesses(&request.weaknesses, &profile.weaknesses);
        let focus = research_focus(&weaknesses);

        let report = Researcher::new(client.clone(), self.prompts.clone())
            .with_max_iterations(self.max_iterations)
            .run(&document, &focus, events)
            .await?;

        Ok(report.facts)
    }

    /// Remember what was studied. A failed write is reported, not fatal.
    async fn record_topic(&self, request: &QuizRequest, events: &ProgressSink) {
        let topic = studied_topic(request);
        match self.store.record_topic_studied(&request.user_id, &topic).await {
            Ok(()) => events.emit(
                COORDINATOR,
                EventKind::Memory,
                format!("Recorded topic \"{}\" for {}", topic, request.user_id),
            ),
            Err(e) => {
                warn!("Could not record topic for {}: {}", request.user_id, e);
                events.emit(COORDINATOR, EventKind::Error, format!("Could not record topic: {}", e));
            }
        }
    }

    fn fail(&self, session: &mut PipelineSession, err: QuizError, events: &ProgressSink) -> QuizError {
        if let Err(transition) = session.fail(&err) {
            warn!("{}", transition);
        }
        events.emit(COORDINATOR, EventKind::Error, err.to_string());
        err
    }
}

/// Topic label for the studied-topics record.
///
/// Session weaknesses name it when present; otherwise the document's first
/// line does.
fn studied_topic(request: &QuizRequest) -> String {
    let named: Vec<&str> = request
        .weaknesses
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    if !named.is_empty() {
        return named.join(", ");
    }

    let heading = match &request.document {
        DocumentInput::Text { text } => text.lines().map(str::trim).find(|l| !l.is_empty()),
        DocumentInput::Inline { .. } => None,
    };
    match heading {
        Some(line) => {
            let mut topic: String = line.chars().take(TOPIC_CHARS).collect();
            if line.chars().count() > TOPIC_CHARS {
                topic.push_str("...");
            }
            topic
        }
        None => match &request.document {
            DocumentInput::Inline { format, .. } if !format.is_empty() => format!("{} document", format),
            _ => "general concepts".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::NO_MATCHES;
    use crate::approval::StaticApproval;
    use crate::memory::JsonWeaknessStore;
    use crate::model::testing::{examiner_reply, ScriptedClient, ScriptedProvider};
    use crate::model::{ModelTurn, ToolInvocation, Turn};
    use crate::quiz::QuestionKind;
    use tokio_test::{assert_err, assert_ok};

    const DOC: &str = "The sky is blue.\nWater boils at 100C.";
    const FIVE_FACTS: &str =
        "1. The sky is blue.\n2. Water boils at 100C.\n3. The sky is blue.\n4. Water boils at 100C.\n5. The sky is blue.";

    struct Harness {
        _dir: tempfile::TempDir,
        client: Arc<ScriptedClient>,
        store: Arc<JsonWeaknessStore>,
        pipeline: Pipeline,
    }

    fn harness(client: ScriptedClient) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(client);
        let store = Arc::new(JsonWeaknessStore::new(dir.path().join("memory")));
        let settings = Settings::default();
        let pipeline = Pipeline::new(&settings, Arc::new(ScriptedProvider(client.clone())), store.clone()).unwrap();
        Harness {
            _dir: dir,
            client,
            store,
            pipeline,
        }
    }

    fn request(weaknesses: &[&str]) -> QuizRequest {
        QuizRequest {
            credential: Some("sk-test".to_string()),
            model_id: String::new(),
            document: DocumentInput::text(DOC),
            weaknesses: weaknesses.iter().map(|w| w.to_string()).collect(),
            user_id: "u1".to_string(),
        }
    }

    fn search_then_answer() -> Vec<Result<ModelTurn>> {
        vec![
            Ok(ModelTurn::ToolCalls(vec![ToolInvocation {
                id: "call-1".to_string(),
                name: "search_document".to_string(),
                arguments: r#"{"query": "sky"}"#.to_string(),
            }])),
            Ok(ModelTurn::Final(FIVE_FACTS.to_string())),
        ]
    }

    #[test]
    fn test_state_machine_edges() {
        assert!(Stage::Init.can_advance_to(Stage::Researching));
        assert!(Stage::AwaitingApproval.can_advance_to(Stage::Aborted));
        assert!(!Stage::AwaitingApproval.can_advance_to(Stage::Failed));
        assert!(!Stage::Generating.can_advance_to(Stage::Researching));
        assert!(!Stage::Assembled.can_advance_to(Stage::Failed));
        assert!(Stage::Aborted.is_terminal());
    }

    #[test]
    fn test_session_rejects_skipped_stage() {
        let mut session = PipelineSession::new("u1");
        let err = session.advance(Stage::Generating).unwrap_err();
        assert_eq!(err.to_string(), "Invalid pipeline transition: INIT -> GENERATING");
        assert_eq!(session.stage(), Stage::Init);

        assert_ok!(session.advance(Stage::Researching));
        assert_ok!(session.fail(&QuizError::Backend("down".to_string())));
        assert_eq!(session.error(), Some("down"));
        assert_err!(session.advance(Stage::AwaitingApproval));
    }

    #[test]
    fn test_session_holds_facts_and_quiz() {
        let mut session = PipelineSession::new("u1");
        assert_err!(session.assemble(Quiz::fallback()));
        assert!(session.quiz().is_none());

        assert_ok!(session.advance(Stage::Researching));
        let facts = FactSet::from_model_output("1. The sky is blue.").unwrap();
        assert_ok!(session.await_approval(facts.clone()));
        assert_eq!(session.facts(), Some(&facts));

        assert_ok!(session.advance(Stage::Generating));
        assert_ok!(session.assemble(Quiz::fallback()));
        assert_eq!(session.stage(), Stage::Assembled);
        assert_eq!(session.quiz(), Some(&Quiz::fallback()));
    }

    #[test]
    fn test_document_input_shapes() {
        let text: DocumentInput = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(text, DocumentInput::text("hello"));

        let inline: DocumentInput =
            serde_json::from_str(r#"{"base64": "aGk=", "mimeType": "image/png", "format": "image"}"#).unwrap();
        assert!(matches!(inline, DocumentInput::Inline { ref mime_type, .. } if mime_type == "image/png"));
    }

    #[test]
    fn test_studied_topic() {
        assert_eq!(studied_topic(&request(&["Engines", " "])), "Engines");
        assert_eq!(studied_topic(&request(&[])), "The sky is blue.");

        let mut long = request(&[]);
        long.document = DocumentInput::text("x".repeat(100));
        assert_eq!(studied_topic(&long).chars().count(), TOPIC_CHARS + 3);
    }

    #[tokio::test]
    async fn test_full_run_assembles_quiz() {
        let h = harness(
            ScriptedClient::new()
                .with_turns(search_then_answer())
                .with_responder(examiner_reply),
        );
        let (events, mut rx) = ProgressSink::channel();

        let outcome = h
            .pipeline
            .run(request(&[]), &StaticApproval::approve(), &events)
            .await
            .unwrap();

        assert_eq!(outcome.stage(), Stage::Assembled);
        assert_eq!(outcome.session.user_id, "u1");
        assert!(outcome.session.error().is_none());
        assert_eq!(outcome.session.facts().map(|f| f.len()), Some(5));
        assert!(!outcome.degraded);
        let quiz = outcome.quiz().unwrap();
        assert_eq!(quiz.len(), 5);
        assert_eq!(quiz.count_kind(QuestionKind::MultipleChoice), 3);
        assert_eq!(quiz.count_kind(QuestionKind::TrueFalse), 1);
        assert_eq!(quiz.count_kind(QuestionKind::FillBlank), 1);

        // The search result went back to the model.
        let conversations = h.client.conversations.lock().unwrap();
        assert!(matches!(
            conversations[1].last(),
            Some(Turn::ToolResult { content, .. }) if content == "The sky is blue."
        ));
        drop(conversations);

        let profile = h.store.get_profile("u1").await;
        assert!(profile.topics_studied.contains("The sky is blue."));

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert!(kinds.contains(&EventKind::Action));
        assert!(kinds.contains(&EventKind::Memory));
        assert_eq!(kinds.last(), Some(&EventKind::Done));
    }

    #[tokio::test]
    async fn test_historical_weaknesses_shape_focus() {
        let h = harness(
            ScriptedClient::new()
                .with_turns(vec![Ok(ModelTurn::Final(FIVE_FACTS.to_string()))])
                .with_responder(examiner_reply),
        );
        h.store.update_weaknesses("u1", &["Brakes".to_string()]).await.unwrap();

        h.pipeline
            .run(request(&["Engines"]), &StaticApproval::approve(), &ProgressSink::silent())
            .await
            .unwrap();

        let conversations = h.client.conversations.lock().unwrap();
        assert!(matches!(
            &conversations[0][1],
            Turn::User(prompt) if prompt.contains("concepts related to: Engines, Brakes")
        ));
    }

    #[tokio::test]
    async fn test_rejection_aborts_without_generation() {
        let h = harness(
            ScriptedClient::new()
                .with_turns(vec![Ok(ModelTurn::Final(FIVE_FACTS.to_string()))])
                .with_responder(examiner_reply),
        );

        let outcome = h
            .pipeline
            .run(request(&[]), &StaticApproval::reject(), &ProgressSink::silent())
            .await
            .unwrap();

        assert_eq!(outcome.stage(), Stage::Aborted);
        assert!(outcome.quiz().is_none());
        assert_eq!(outcome.session.facts().map(|f| f.len()), Some(5));
        assert_eq!(h.client.generate_calls(), 0);

        // Only the topic record was written.
        let profile = h.store.get_profile("u1").await;
        assert_eq!(profile.topics_studied.len(), 1);
        assert!(profile.weaknesses.is_empty());
        assert!(profile.quiz_history.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_generation_degrades() {
        let h = harness(
            ScriptedClient::new()
                .with_turns(vec![Ok(ModelTurn::Final(FIVE_FACTS.to_string()))])
                .with_responder(|_| Ok("I'm sorry, I can't do that.".to_string())),
        );

        let outcome = h
            .pipeline
            .run(request(&[]), &StaticApproval::approve(), &ProgressSink::silent())
            .await
            .unwrap();

        assert_eq!(outcome.stage(), Stage::Assembled);
        assert!(outcome.degraded);
        assert_eq!(outcome.quiz(), Some(&Quiz::fallback()));
        assert_eq!(outcome.reports.len(), 3);
    }

    #[tokio::test]
    async fn test_research_failure_surfaces_original_error() {
        let h = harness(
            ScriptedClient::new().with_turns(vec![Err(QuizError::Backend("quota exceeded".to_string()))]),
        );
        let (events, mut rx) = ProgressSink::channel();

        let err = h
            .pipeline
            .run(request(&[]), &StaticApproval::approve(), &events)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "quota exceeded");
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        let last = last.unwrap();
        assert_eq!(last.kind, EventKind::Error);
        assert_eq!(last.message, "quota exceeded");

        // Nothing is recorded when research fails.
        assert!(h.store.get_profile("u1").await.topics_studied.is_empty());
    }

    #[tokio::test]
    async fn test_empty_facts_fail_the_run() {
        let h = harness(ScriptedClient::new().with_turns(vec![Ok(ModelTurn::Final("  ".to_string()))]));

        let err = h
            .pipeline
            .run(request(&[]), &StaticApproval::approve(), &ProgressSink::silent())
            .await
            .unwrap_err();

        assert!(matches!(err, QuizError::ResearchIncomplete(_)));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_generation() {
        let h = harness(
            ScriptedClient::new()
                .with_turns(vec![Ok(ModelTurn::Final(FIVE_FACTS.to_string()))])
                .with_responder(|_| Err(QuizError::Credential)),
        );

        let err = h
            .pipeline
            .run(request(&[]), &StaticApproval::approve(), &ProgressSink::silent())
            .await
            .unwrap_err();

        assert!(matches!(err, QuizError::Credential));
    }

    #[tokio::test]
    async fn test_inline_document_is_extracted_first() {
        let h = harness(
            ScriptedClient::new()
                .with_turns(vec![
                    Ok(ModelTurn::ToolCalls(vec![ToolInvocation {
                        id: "call-1".to_string(),
                        name: "search_document".to_string(),
                        arguments: r#"{"query": "volcano"}"#.to_string(),
                    }])),
                    Ok(ModelTurn::Final(FIVE_FACTS.to_string())),
                ])
                .with_responder(|prompt| {
                    if prompt.contains("OCR") {
                        Ok("Diagram: the sky is blue.".to_string())
                    } else {
                        examiner_reply(prompt)
                    }
                }),
        );
        let mut req = request(&[]);
        req.document = DocumentInput::Inline {
            base64: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
            format: "image".to_string(),
        };

        let outcome = h
            .pipeline
            .run(req, &StaticApproval::approve(), &ProgressSink::silent())
            .await
            .unwrap();

        assert_eq!(outcome.quiz().map(|q| q.len()), Some(5));
        let conversations = h.client.conversations.lock().unwrap();
        assert!(matches!(
            &conversations[0][1],
            Turn::User(prompt) if prompt.contains("Diagram: the sky is blue.")
        ));
        assert!(matches!(
            conversations[1].last(),
            Some(Turn::ToolResult { content, .. }) if content == NO_MATCHES
        ));
        drop(conversations);
        assert!(h.store.get_profile("u1").await.topics_studied.contains("image document"));
    }
}
