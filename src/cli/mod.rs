//! Command-line interface for assetpack
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: One-off build
//! - `watch`: Rebuild on source changes
//! - `init`: Project scaffolding

mod build;
mod init;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::{BuildCommand, BuildOptions};
pub use init::InitCommand;
pub use watch::WatchCommand;

/// assetpack - bundle stylesheets, SCSS, fonts and images into a static directory
#[derive(Parser, Debug)]
#[command(name = "assetpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (default: ./assetpack.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project into the output directory
    Build(BuildCommand),

    /// Build, then rebuild whenever a source file changes
    Watch(WatchCommand),

    /// Initialize a new project
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(self.config.as_deref()).await,
            Commands::Watch(cmd) => cmd.execute(self.config.as_deref()).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the assetpack banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "◆".cyan(),
        "assetpack".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
