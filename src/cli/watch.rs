//! Watch command implementation

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::build::{print_summary, run_build, BuildOptions};
use crate::config::{Config, DEFAULT_CONFIG_FILE};

/// Build, then rebuild whenever a source file changes
#[derive(Args, Debug)]
pub struct WatchCommand {
    /// Output directory (overrides output.dir)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Skip minimizers
    #[arg(long)]
    pub no_minify: bool,
}

impl WatchCommand {
    pub async fn execute(&self, config_path: Option<&str>) -> Result<()> {
        let options = BuildOptions {
            outdir: self.outdir.clone(),
            minify: !self.no_minify,
        };

        let config = Config::discover(config_path)?;
        let output_dir = match &options.outdir {
            Some(dir) => std::env::current_dir()?.join(dir),
            None => config.output_dir(),
        };

        rebuild(config_path, &options).await;

        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(Duration::from_millis(200), move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })?;

        let config_file = Path::new(config_path.unwrap_or(DEFAULT_CONFIG_FILE));
        if config_file.is_file() {
            debouncer
                .watcher()
                .watch(config_file, RecursiveMode::NonRecursive)?;
        }
        for root in config.watch_roots() {
            debug!("Watching {}", root.display());
            debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;
        }

        eprintln!(
            "  {} Watching for changes, press {} to stop\n",
            "•".dimmed(),
            "Ctrl+C".yellow()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = rx.recv() => match event {
                    Some(Ok(events)) => {
                        let changed: Vec<&Path> = events
                            .iter()
                            .map(|e| e.path.as_path())
                            .filter(|p| !p.starts_with(&output_dir))
                            .collect();
                        if let Some(first) = changed.first() {
                            eprintln!(
                                "  {} File changed: {}",
                                "↻".yellow(),
                                first.display().to_string().dimmed()
                            );
                            rebuild(config_path, &options).await;
                        }
                    }
                    Some(Err(e)) => error!("Watch error: {:?}", e),
                    None => break,
                },
            }
        }

        Ok(())
    }
}

/// Run a build and report its outcome; a failed build keeps the watcher alive
async fn rebuild(config_path: Option<&str>, options: &BuildOptions) {
    let start = Instant::now();
    match run_build(config_path, options.clone()).await {
        Ok(result) => print_summary(&result, start.elapsed()),
        Err(e) => eprintln!("{} Build failed: {:#}\n", "✗".red().bold(), e),
    }
}
