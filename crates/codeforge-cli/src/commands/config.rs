//! Configuration management commands.

use codeforge_core::config::IssueSeverity;
use codeforge_core::Config;

use crate::{AppContext, ConfigAction};

pub async fn handle(action: ConfigAction, ctx: &AppContext) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", ctx.config.to_toml_string()?);
        }
        ConfigAction::Validate => {
            let result = ctx.config.validate();
            if result.issues.is_empty() {
                println!("Configuration is valid.");
                return Ok(());
            }

            for issue in &result.issues {
                let label = match issue.severity {
                    IssueSeverity::Error => "error",
                    IssueSeverity::Warning => "warning",
                };
                println!("{}: {}: {}", label, issue.field, issue.message);
            }

            if !result.is_ok() {
                anyhow::bail!("configuration has {} error(s)", result.errors().len());
            }
        }
        ConfigAction::Path => {
            println!("config:   {}", Config::config_dir().join("config.toml").display());
            println!("project:  .codeforge/config.toml");
            println!("database: {}", ctx.config.storage.resolve_database_path().display());
        }
    }
    Ok(())
}
