//! Command-line interface.
//!
//! Parses arguments, loads settings and dispatches to command modules.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "receipt-extractor")]
#[command(about = "Extract structured receipt details from photos")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP extraction service
    Serve {
        /// Bind address: "host:port", a bare port, or a bare host
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Extract receipt details from a local image and store the result
    Extract {
        /// Image file to process
        file: PathBuf,
        /// Model provider: OPENAI or GOOGLE
        #[arg(short, long)]
        provider: Option<String>,
        /// Model name (defaults to the provider's default)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print the OCR text of an image without calling a model
    Ocr {
        /// Image file to read
        file: PathBuf,
    },

    /// Show which OCR engines are usable
    OcrCheck,

    /// List stored receipt records
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind = commands::serve::parse_bind_address(&bind, &settings.bind);
            }
            commands::serve::cmd_serve(&settings).await
        }
        Commands::Extract {
            file,
            provider,
            model,
        } => commands::extract::cmd_extract(&settings, &file, provider, model).await,
        Commands::Ocr { file } => commands::ocr::cmd_ocr(&settings, &file).await,
        Commands::OcrCheck => commands::ocr::cmd_ocr_check(&settings).await,
        Commands::List { json } => commands::list::cmd_list(&settings, json).await,
    }
}
