//! Build command implementation

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::bundler::{BuildResult, Bundler};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::utils::{format_duration, format_size};

/// Build the project into the output directory
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output directory (overrides output.dir)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Skip minimizers
    #[arg(long)]
    pub no_minify: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: Option<&str>) -> Result<()> {
        let start = Instant::now();

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Building project...");
        spinner.enable_steady_tick(Duration::from_millis(80));

        let result = run_build(config_path, self.into()).await;
        spinner.finish_and_clear();

        print_summary(&result?, start.elapsed());
        Ok(())
    }
}

/// Load the configuration and run one build
pub(crate) async fn run_build(config_path: Option<&str>, options: BuildOptions) -> Result<BuildResult> {
    info!(
        "Loading configuration from {}",
        config_path.unwrap_or(DEFAULT_CONFIG_FILE)
    );
    let config = Config::discover(config_path)?;

    let bundler = Bundler::new(config, options)?;
    bundler.build().await
}

/// Print what a build wrote
pub(crate) fn print_summary(result: &BuildResult, duration: Duration) {
    eprintln!(
        "\n{} Wrote {} file(s) to {} in {}\n",
        "✓".green().bold(),
        result.assets.len(),
        result.output_dir.display().to_string().cyan(),
        format_duration(duration)
    );

    for asset in &result.assets {
        let name = asset
            .output_path
            .strip_prefix(&result.output_dir)
            .unwrap_or(&asset.output_path);

        eprintln!(
            "  {} {} {}",
            "•".dimmed(),
            name.display().to_string().cyan(),
            format_size(asset.size).dimmed()
        );
    }

    eprintln!();
}

/// Build options derived from command arguments
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub outdir: Option<PathBuf>,
    pub minify: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            outdir: None,
            minify: true,
        }
    }
}

impl From<&BuildCommand> for BuildOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            outdir: cmd.outdir.clone(),
            minify: !cmd.no_minify,
        }
    }
}
