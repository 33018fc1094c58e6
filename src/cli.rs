//! Command-line interface for the news digest binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape national news headlines, filter by keyword, and mail a daily digest")]
pub struct Cli {
    /// Config file (JSON, or TOML by extension). Defaults to ./config.json
    #[arg(short, long, env = "NEWS_DIGEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daily scheduler until Ctrl-C, reloading the config on change
    Run,
    /// Run the pipeline once and print what matched
    Fetch {
        /// Print items as JSON instead of the plain digest
        #[arg(long)]
        json: bool,
    },
    /// Fetch and mail the digest now, even if nothing matched
    Send,
    /// Connect and authenticate to the SMTP server without sending
    TestMail,
    /// Print the next scheduled delivery time
    NextRun,
    /// Request every source page once and report whether it answered
    CheckSources {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}
