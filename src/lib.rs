//! assetpack library
//!
//! Core functionality for the assetpack bundler.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod optimize;
pub mod plugins;
pub mod resolver;
pub mod rules;
pub mod transform;
pub mod utils;

pub use bundler::Bundler;
pub use cli::Cli;
pub use config::Config;
pub use error::BuildError;
