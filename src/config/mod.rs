//! Configuration module for Quizwright.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExtractionPrompts, GenerationPrompts, Prompts, ResearchPrompts};
pub use settings::{
    GeneralSettings, GenerationSettings, KindCount, MemorySettings, ModelSettings,
    PromptSettings, ResearchSettings, ServerSettings, Settings, TaskSettings,
};
