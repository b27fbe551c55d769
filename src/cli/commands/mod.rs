//! CLI command implementations.

mod config;
mod memory;
mod quiz;
mod serve;

pub use config::run_config;
pub use memory::run_memory;
pub use quiz::run_quiz;
pub use serve::run_serve;
