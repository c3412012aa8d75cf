use std::path::PathBuf;

use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Engine tuning shared by `run` and `probe`. Flags override the config file.
#[derive(clap::Args, Debug, Clone)]
pub struct Tuning {
    /// JSON config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Targets probed in parallel (default: 10)
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds (default: 10)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Delay between techniques on one target, in ms (default: 50)
    #[arg(long)]
    pub delay: Option<u64>,

    /// Fallback HTTP methods, comma separated (default: POST,PUT,PATCH,DELETE,OPTIONS,TRACE)
    #[arg(long, value_delimiter = ',')]
    pub methods: Option<Vec<String>>,

    /// JSON technique catalog replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Attempt bypasses on every 401/403 record of a candidate file
    Run {
        /// JSON array or JSONL of {"url", "status"} records
        input: PathBuf,

        /// Write the url -> outcome map here as JSON
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// Attempt bypasses on a single restricted URL
    Probe {
        url: String,

        /// Status the URL originally answered with (401 or 403)
        #[arg(short = 's', long, default_value_t = 403_u16)]
        status: u16,

        #[command(flatten)]
        tuning: Tuning,
    },

    /// List the techniques that would be tried against a URL (no requests sent)
    Techniques {
        url: String,

        /// JSON technique catalog replacing the built-in one
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
