//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tillroll - turn receipt scans into structured data with Document AI
#[derive(Parser)]
#[command(name = "tillroll")]
#[command(about = "Extract receipt data with a Google Cloud Document AI receipt processor", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the platform config dir, e.g. ~/.config/tillroll/tillroll.toml)
    #[arg(long, global = true, env = "TILLROLL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Google Cloud project id
    #[arg(long, global = true, env = "TILLROLL_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Processor location, e.g. us or eu
    #[arg(long, global = true, env = "TILLROLL_LOCATION")]
    pub location: Option<String>,

    /// Receipt processor id
    #[arg(long, global = true, env = "TILLROLL_PROCESSOR_ID")]
    pub processor_id: Option<String>,

    /// Service account JSON key file
    #[arg(long, global = true, env = "TILLROLL_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Pre-obtained OAuth2 access token, used when no key file is given
    #[arg(long, global = true, env = "TILLROLL_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Reject PDF uploads (for processors that only accept images)
    #[arg(long, global = true)]
    pub images_only: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process one or more receipt files (.jpg, .jpeg, .png, .tif, .tiff, .pdf)
    Scan {
        /// Receipt files to process
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the record as JSON instead of the two-column layout
        #[arg(long)]
        json: bool,

        /// Append the raw JSON record after the layout
        #[arg(long, conflicts_with = "json")]
        raw: bool,
    },

    /// Watch a folder and process receipts as they are dropped into it
    Watch {
        /// Intake folder
        dir: PathBuf,

        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Milliseconds a new file's size must stay unchanged before it is processed
        #[arg(long, default_value_t = tillroll_docai::DEFAULT_SETTLE.as_millis() as u64)]
        settle_ms: u64,
    },

    /// Validate configuration and show where requests would be sent
    Check,
}
