//! Parallel generation stage: one examiner per task, merged in dispatch order.

use crate::config::{Prompts, TaskSettings};
use crate::error::{QuizError, Result};
use crate::events::{EventKind, ProgressSink};
use crate::model::ModelClient;
use crate::quiz::{FactSet, QuestionKind, Question, Quiz};
use crate::recovery::recover_questions;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Event source name of the generation stage as a whole.
pub const GENERATOR: &str = "Generator";

/// A validated partition of question kinds into parallel tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPlan {
    tasks: Vec<TaskSettings>,
}

impl GenerationPlan {
    /// Check that every task asks for something and no kind is requested twice.
    pub fn new(tasks: Vec<TaskSettings>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(QuizError::Config("generation plan has no tasks".to_string()));
        }

        let mut seen = BTreeSet::new();
        for (idx, task) in tasks.iter().enumerate() {
            if task.questions.is_empty() {
                return Err(QuizError::Config(format!("generation task {} requests no questions", idx)));
            }
            for request in &task.questions {
                if request.count == 0 {
                    return Err(QuizError::Config(format!(
                        "generation task {} requests zero {} questions",
                        idx, request.kind
                    )));
                }
                if !seen.insert(request.kind) {
                    return Err(QuizError::Config(format!(
                        "question kind {} is assigned to more than one task",
                        request.kind
                    )));
                }
            }
        }

        Ok(Self { tasks })
    }

    pub fn tasks(&self) -> &[TaskSettings] {
        &self.tasks
    }

    /// Total number of questions requested across all tasks.
    pub fn requested(&self) -> u32 {
        self.tasks
            .iter()
            .flat_map(|t| t.questions.iter().map(|q| q.count))
            .sum()
    }
}

/// One examiner's assignment, with its prompt already rendered.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub index: usize,
    /// Questions requested per kind.
    pub counts: Vec<(QuestionKind, u32)>,
    pub prompt: String,
}

impl GenerationTask {
    pub fn kinds(&self) -> impl Iterator<Item = QuestionKind> + '_ {
        self.counts.iter().map(|(kind, _)| *kind)
    }

    /// Total questions this task asks for.
    pub fn requested(&self) -> u32 {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    /// Event source name, e.g. `Examiner[multiple-choice]`.
    pub fn source(&self) -> String {
        let kinds: Vec<&str> = self.kinds().map(|k| k.as_str()).collect();
        format!("Examiner[{}]", kinds.join("+"))
    }
}

/// Per-task result summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub source: String,
    pub produced: usize,
    /// Entries recovery had to discard.
    pub dropped: usize,
    pub error: Option<String>,
}

/// Merged output of the generation stage.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub quiz: Quiz,
    pub reports: Vec<TaskReport>,
    /// True when every task failed and the quiz is the fallback placeholder.
    pub degraded: bool,
}

/// Fans generation out over the plan's tasks.
pub struct Examiners {
    client: Arc<dyn ModelClient>,
    prompts: Prompts,
    plan: GenerationPlan,
    max_concurrent: usize,
}

impl Examiners {
    pub fn new(client: Arc<dyn ModelClient>, prompts: Prompts, plan: GenerationPlan) -> Self {
        Self {
            client,
            prompts,
            plan,
            max_concurrent: 0,
        }
    }

    /// Limit tasks in flight; 0 runs all tasks at once.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Render the prompt for every task in the plan.
    pub fn build_tasks(&self, facts: &FactSet) -> Vec<GenerationTask> {
        self.plan
            .tasks()
            .iter()
            .enumerate()
            .map(|(index, task)| {
                let counts: Vec<(QuestionKind, u32)> = task.questions.iter().map(|q| (q.kind, q.count)).collect();
                let distribution = counts
                    .iter()
                    .map(|(kind, count)| format!("- {} {} question(s)", count, kind))
                    .collect::<Vec<_>>()
                    .join("\n");
                let examples = counts
                    .iter()
                    .map(|(kind, _)| format!("  {}", kind.example()))
                    .collect::<Vec<_>>()
                    .join(",\n");

                let mut vars = HashMap::new();
                vars.insert("facts".to_string(), facts.numbered());
                vars.insert("distribution".to_string(), distribution);
                vars.insert("examples".to_string(), format!("[\n{}\n]", examples));

                GenerationTask {
                    index,
                    counts,
                    prompt: self.prompts.render_with_custom(&self.prompts.generation.task, &vars),
                }
            })
            .collect()
    }

    /// Run every task concurrently and merge the results.
    ///
    /// A task that fails contributes nothing; the rest still count. A missing
    /// credential aborts the whole stage. If no task succeeds the quiz is the
    /// single retry notice and the outcome is flagged degraded.
    #[instrument(skip(self, facts, events), fields(tasks = self.plan.tasks().len()))]
    pub async fn generate(&self, facts: &FactSet, events: &ProgressSink) -> Result<GenerationOutcome> {
        let tasks = self.build_tasks(facts);
        let task_count = tasks.len();
        let limit = if self.max_concurrent == 0 {
            task_count.max(1)
        } else {
            self.max_concurrent
        };

        events.emit(
            GENERATOR,
            EventKind::Info,
            format!("Dispatching {} examiner(s) for {} question(s)", task_count, self.plan.requested()),
        );
        info!("Dispatching {} generation tasks, {} at a time", task_count, limit);

        let mut results = Vec::with_capacity(task_count);
        let mut stream = stream::iter(tasks)
            .map(|task| async move {
                let outcome = self.run_task(&task, events).await;
                (task.index, task.source(), outcome)
            })
            .buffer_unordered(limit);

        while let Some((index, source, outcome)) = stream.next().await {
            match outcome {
                Err(e) if !e.is_task_local() => return Err(e),
                outcome => results.push((index, source, outcome)),
            }
        }

        // Completion order is arbitrary; the quiz follows dispatch order.
        results.sort_by_key(|(index, _, _)| *index);

        let mut questions: Vec<Question> = Vec::new();
        let mut reports = Vec::with_capacity(task_count);
        for (_, source, outcome) in results {
            match outcome {
                Ok(recovered) => {
                    reports.push(TaskReport {
                        source,
                        produced: recovered.questions.len(),
                        dropped: recovered.dropped.len(),
                        error: None,
                    });
                    questions.extend(recovered.questions);
                }
                Err(e) => reports.push(TaskReport {
                    source,
                    produced: 0,
                    dropped: 0,
                    error: Some(e.to_string()),
                }),
            }
        }

        let failed = reports.iter().filter(|r| r.error.is_some()).count();
        if failed == task_count {
            let err = QuizError::AllTasksFailed(task_count);
            warn!("{}", err);
            events.emit(GENERATOR, EventKind::Error, format!("{}; returning placeholder quiz", err));
            return Ok(GenerationOutcome {
                quiz: Quiz::fallback(),
                reports,
                degraded: true,
            });
        }

        events.emit(
            GENERATOR,
            EventKind::Done,
            format!(
                "Assembled {} question(s) from {} of {} examiner(s)",
                questions.len(),
                task_count - failed,
                task_count
            ),
        );

        Ok(GenerationOutcome {
            quiz: Quiz::new(questions),
            reports,
            degraded: false,
        })
    }

    async fn run_task(
        &self,
        task: &GenerationTask,
        events: &ProgressSink,
    ) -> Result<crate::recovery::Recovered> {
        let source = task.source();
        events.emit(&source, EventKind::Start, format!("Generating {} question(s)", task.requested()));

        let result = match self.client.generate(&task.prompt, None).await {
            Ok(raw) => recover_questions(&raw),
            Err(e) => Err(e),
        };

        match &result {
            Ok(recovered) => {
                if !recovered.dropped.is_empty() {
                    debug!("{} dropped entries: {:?}", source, recovered.dropped);
                }
                events.emit(
                    &source,
                    EventKind::Done,
                    format!(
                        "Produced {} question(s), dropped {}",
                        recovered.questions.len(),
                        recovered.dropped.len()
                    ),
                );
            }
            Err(e) => {
                warn!("{} failed: {}", source, e);
                events.emit(&source, EventKind::Error, e.to_string());
            }
        }

        result
    }
}
