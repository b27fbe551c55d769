//! Quizwright - documents in, quizzes out
//!
//! An agent pipeline that turns a document into a multi-type quiz, with a
//! per-user weakness profile that biases later runs.
//!
//! # Overview
//!
//! One run goes through these stages:
//! - A researcher agent reads the document, searching it with a tool when it
//!   wants to, and states a handful of key facts
//! - An approval gate lets a person accept or reject those facts
//! - Examiners write questions of different kinds from the facts in parallel
//! - Each examiner's raw output is repaired into well-formed questions
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `model` - Model client abstraction and the OpenAI-compatible backend
//! - `agent` - Researcher, search tool and parallel examiners
//! - `recovery` - Repair of model output into questions
//! - `quiz` - Question kinds, facts and quizzes
//! - `memory` - Durable per-user weakness profiles
//! - `approval` - The human checkpoint
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use quizwright::approval::StaticApproval;
//! use quizwright::config::Settings;
//! use quizwright::events::ProgressSink;
//! use quizwright::memory::JsonWeaknessStore;
//! use quizwright::model::OpenAIProvider;
//! use quizwright::orchestrator::{DocumentInput, Pipeline, QuizRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let provider = Arc::new(OpenAIProvider::new(settings.model.clone()));
//!     let store = Arc::new(JsonWeaknessStore::new(settings.memory_dir()));
//!     let pipeline = Pipeline::new(&settings, provider, store)?;
//!
//!     let request = QuizRequest {
//!         credential: std::env::var("OPENAI_API_KEY").ok(),
//!         model_id: String::new(),
//!         document: DocumentInput::text("The sky is blue.\nWater boils at 100C."),
//!         weaknesses: vec![],
//!         user_id: "me".to_string(),
//!     };
//!     let outcome = pipeline
//!         .run(request, &StaticApproval::approve(), &ProgressSink::silent())
//!         .await?;
//!     println!("{} questions", outcome.quiz().map(|q| q.len()).unwrap_or(0));
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod approval;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod memory;
pub mod model;
pub mod openai;
pub mod orchestrator;
pub mod quiz;
pub mod recovery;

pub use error::{QuizError, Result};
