use std::path::PathBuf;

use atelier_core::{AspectRatio, ProviderKind};
use clap::{Parser, Subcommand};

/// Atelier generation core
#[derive(Debug, Parser)]
#[command(name = "atelier", about = "Generate images and structured text with Gemini, OpenAI, OpenRouter, or Perplexity")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "atelier.toml", env = "ATELIER_CONFIG", global = true)]
    pub config: PathBuf,

    /// Generate with this user's saved key instead of the bundled one
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Log filter, e.g. "debug" or "atelier_providers=trace"
    #[arg(long, env = "ATELIER_LOG", global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate JSON text
    Text {
        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// JSON schema file constraining the response
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Generate an image, or edit input images
    Image {
        /// Prompt text
        #[arg(short, long)]
        prompt: String,

        /// Input image, repeatable
        #[arg(short, long = "input")]
        inputs: Vec<PathBuf>,

        /// Output aspect ratio as W:H
        #[arg(short, long)]
        aspect_ratio: Option<AspectRatio>,

        /// Where to write the generated image
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check an API key against a provider
    ValidateKey {
        #[arg(long)]
        provider: ProviderKind,

        #[arg(long)]
        key: String,
    },

    /// Manage the saved key of the user given with --user
    #[command(subcommand)]
    Key(KeyCommand),
}

#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Show which provider the saved key belongs to
    Show,

    /// Save a key and use it from now on
    Set {
        #[arg(long)]
        provider: ProviderKind,

        #[arg(long, env = "ATELIER_API_KEY", hide_env_values = true)]
        key: String,
    },

    /// Delete the saved key
    Clear,
}
