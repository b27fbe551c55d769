//! CLI module for Quizwright.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Quizwright - turn documents into quizzes
///
/// A researcher agent pulls key facts out of a document, you approve them,
/// and a team of examiners writes questions of several kinds in parallel.
#[derive(Parser, Debug)]
#[command(name = "quizwright")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a quiz from a document
    Quiz {
        /// Text or image file to study ('-' reads text from stdin and requires --yes)
        input: String,

        /// Skip the fact review and generate straight away
        #[arg(short, long)]
        yes: bool,

        /// Concept to focus on (repeatable)
        #[arg(short, long = "weakness")]
        weaknesses: Vec<String>,

        /// User whose weakness profile to use
        #[arg(short, long, default_value = "default")]
        user: String,

        /// Model to use (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Write the quiz as JSON to this file
        #[arg(short, long)]
        output: Option<String>,

        /// API key for the model backend
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Start HTTP API server for the quiz front end
    Serve {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or update a user's weakness profile
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum MemoryAction {
    /// Show a user's profile
    Show {
        #[arg(default_value = "default")]
        user: String,
    },

    /// Record a finished quiz
    Record {
        /// Correct answers
        score: u32,
        /// Questions in the quiz
        total: u32,
        /// What the quiz covered
        topic: String,
        #[arg(short, long, default_value = "default")]
        user: String,
    },

    /// Add weaknesses to a user's profile
    Weaknesses {
        /// Concepts the user struggles with
        #[arg(required = true)]
        weaknesses: Vec<String>,
        #[arg(short, long, default_value = "default")]
        user: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the current configuration to the config file
    Init,
}
