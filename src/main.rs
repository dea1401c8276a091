//! Nano Banana MCP Server CLI entry point.

use clap::Parser;
use nanobanana_mcp::{Backend, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Nano Banana MCP Server - Gemini chat and image tools over MCP.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Upstream API to use
    #[arg(long, env = "NANOBANANA_BACKEND", value_enum, default_value_t = Backend::Gemini)]
    backend: Backend,

    /// API key (falls back to GOOGLE_API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used for gemini_chat
    #[arg(long, env = "NANOBANANA_CHAT_MODEL")]
    chat_model: Option<String>,

    /// Model used for image generation and editing
    #[arg(long, env = "NANOBANANA_IMAGE_MODEL")]
    image_model: Option<String>,

    /// Where images are saved (default: ~/Documents/nanobanana_generated)
    #[arg(long, env = "NANOBANANA_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Images remembered per session
    #[arg(long, env = "NANOBANANA_HISTORY_CAPACITY")]
    history_capacity: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; stdout belongs to the MCP transport
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api_key = args
        .api_key
        .or_else(|| std::env::var("GOOGLE_API_KEY").ok());

    let config = Config::resolve(
        args.backend,
        api_key,
        args.chat_model,
        args.image_model,
        args.output_dir,
        args.history_capacity,
    )?;

    // Run the MCP server
    nanobanana_mcp::run_server(config).await
}
