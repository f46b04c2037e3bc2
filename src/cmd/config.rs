//! Configuration view and validation commands (`cardsmith config`).

use std::path::Path;

use anyhow::Result;

use cardsmith::config::AppConfig;

use super::super::ConfigCommands;

pub fn cmd_config(
    config_path: &Path,
    config: &AppConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let source = if config_path.exists() {
        format!("Config file: {}", config_path.display())
    } else {
        format!(
            "No {} found; using defaults and environment",
            config_path.display()
        )
    };

    match command {
        None | Some(ConfigCommands::Show) => {
            println!("# {}", source);
            println!();
            print!("{}", config.redacted().to_toml()?);
        }
        Some(ConfigCommands::Validate) => {
            println!("{}", source);
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
    }

    Ok(())
}
