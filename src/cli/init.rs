//! Project initialization command

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::{DEFAULT_CONFIG_FILE, DEFAULT_CONFIG_TOML};

const INDEX_JS: &str = r#"// Stylesheets imported here are extracted into styles.css
import './sass/main.scss';
"#;

const MAIN_SCSS: &str = r#"$text-color: #213547;

body {
  margin: 0;
  color: $text-color;
  font-family: system-ui, Avenir, Helvetica, Arial, sans-serif;
}
"#;

/// Initialize a new project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub name: String,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self) -> Result<()> {
        let project_dir = Path::new(&self.name);

        eprintln!("{} Initializing new project...\n", "→".blue());

        fs::create_dir_all(project_dir).context("Failed to create project directory")?;

        self.write_file(project_dir, DEFAULT_CONFIG_FILE, DEFAULT_CONFIG_TOML)?;
        self.write_file(project_dir, "frontend/index.js", INDEX_JS)?;
        self.write_file(project_dir, "frontend/sass/main.scss", MAIN_SCSS)?;

        eprintln!(
            "\n{} Project initialized successfully!\n",
            "✓".green().bold()
        );

        eprintln!("  Next steps:");
        if self.name != "." {
            eprintln!("    {} cd {}", "→".dimmed(), self.name.cyan());
        }
        eprintln!("    {} assetpack build", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn write_file(&self, project_dir: &Path, rel: &str, content: &str) -> Result<()> {
        let path = project_dir.join(rel);

        if path.exists() && !self.force {
            eprintln!("  {} Kept existing {}", "•".dimmed(), rel.cyan());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", rel))?;
        eprintln!("  {} Created {}", "✓".green(), rel.cyan());

        Ok(())
    }
}
