use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{dates::DatePolicy, destination::ConflictMode, io_utils::Separator};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Union, clean, type and bulk-load delimited files into a relational table",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline and load the result into a SQLite table
    Load(LoadArgs),
    /// Show the column plan (types and widths) without loading anything
    Profile(ProfileArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file to read (repeatable; read in the order given)
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Directory to scan recursively for .csv, .txt and .tsv files (repeatable)
    #[arg(short = 'd', long = "dir", action = clap::ArgAction::Append)]
    pub dirs: Vec<PathBuf>,
    /// YAML run file; explicit flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Field separator: 'comma', 'tab', 'pipe', 'semicolon' or any literal string
    #[arg(long, value_parser = Separator::parse)]
    pub delimiter: Option<Separator>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Quote character (defaults to '"')
    #[arg(long, conflicts_with = "no_quoting")]
    pub quote: Option<char>,
    /// Treat quote characters as ordinary data
    #[arg(long = "no-quoting")]
    pub no_quoting: bool,
    /// Fold runs of underscores in column names into one
    #[arg(long = "collapse-underscores")]
    pub collapse_underscores: bool,
    /// What to do with values in date columns that cannot be parsed
    #[arg(long = "date-policy", value_enum)]
    pub date_policy: Option<DatePolicy>,
    /// Extra token to read as null (repeatable; replaces the built-in list)
    #[arg(long = "null-value", action = clap::ArgAction::Append)]
    pub null_values: Vec<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// SQLite database file to write into (created when missing)
    #[arg(long, required_unless_present_any = ["config", "dry_run"])]
    pub database: Option<PathBuf>,
    /// Destination table name (defaults to tabular_load_<timestamp>)
    #[arg(long)]
    pub table: Option<String>,
    /// How the first chunk treats an existing table
    #[arg(long, value_enum)]
    pub mode: Option<ConflictMode>,
    /// Rows per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Times a chunk is retried after a transport failure
    #[arg(long = "max-retries")]
    pub max_retries: Option<usize>,
    /// Pause before each retry, in milliseconds
    #[arg(long = "retry-delay-ms")]
    pub retry_delay_ms: Option<u64>,
    /// Load into an in-memory table instead of the database
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the width profile as JSON to this path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}
