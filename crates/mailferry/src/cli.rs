//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

/// Copies selected mail into a local document store.
///
/// Every tick, each configured Maildir is scanned for messages sent since its
/// last checkpoint; the selected ones are converted and imported.
#[derive(Parser, Debug)]
#[command(name = "mailferry", version, about)]
pub struct Cli {
    /// Directory holding the document store and checkpoint state
    #[arg(short = 'p', long, env = "MAILFERRY_STORAGE_PATH", value_parser = NonEmptyStringValueParser::new())]
    pub storage_path: String,

    /// Account secret phrase used to unlock the store
    #[arg(short = 'm', long, env = "MAILFERRY_MNEMONIC", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    pub mnemonic: String,

    /// Account id the store belongs to
    #[arg(short = 'a', long, env = "MAILFERRY_ACCOUNT_ID", value_parser = NonEmptyStringValueParser::new())]
    pub account_id: String,

    /// Settings file (default: <config dir>/mailferry/settings.json)
    #[arg(long, env = "MAILFERRY_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Maildir to ingest flagged mail from; may be repeated
    #[arg(long = "maildir", value_name = "DIR")]
    pub maildirs: Vec<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,
}
