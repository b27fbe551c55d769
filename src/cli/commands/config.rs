//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<&str>) -> Result<()> {
    let config_path = config_path
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }

        ConfigAction::Init => {
            write_config(&settings, &config_path)?;
        }
    }

    Ok(())
}

/// Write settings to `path` unless a file is already there.
fn write_config(settings: &Settings, path: &PathBuf) -> Result<()> {
    if path.exists() {
        Output::warning(&format!("Config already exists at {}", path.display()));
        return Ok(());
    }
    settings.save_to(path)?;
    Output::success(&format!("Created config at {}", path.display()));
    Ok(())
}
