//! CLI argument definitions using clap derive macros.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use drivefetch_core::fetch::endpoint::REDACTED;

/// Download a file shared from a hosted drive.
///
/// Follows virus-scan and large-file confirmation pages, falls back across
/// alternate download endpoints, and stores the file under the output
/// directory.
#[derive(Parser)]
#[command(name = "drivefetch")]
#[command(author, version, about)]
pub struct Args {
    /// Share URL or bare file ID
    pub input: String,

    /// Directory that receives the downloaded file
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Files smaller than this many bytes are treated as error pages
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Seconds to wait for response headers (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Drive API key; enables the API endpoint as a last fallback
    #[arg(long)]
    pub api_key: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not render a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("input", &self.input)
            .field("output_dir", &self.output_dir)
            .field("min_size", &self.min_size)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("config", &self.config)
            .field("json", &self.json)
            .field("no_progress", &self.no_progress)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .finish()
    }
}
