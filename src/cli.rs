//! Command-line surfaces of the `lrr-scan` and `lrr-sessions` binaries.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

pub const DEFAULT_LOG_INTERVAL: usize = 10_000;

/// Scan a protein FASTA corpus for leucine-rich repeat motifs.
#[derive(Parser, Debug, Clone)]
#[command(name = "lrr-scan", version)]
pub struct ScanArgs {
    /// Bucket holding the corpus, or a directory when --local is set
    #[arg(required_unless_present = "list_patterns")]
    pub bucket_or_path: Option<String>,

    /// Corpus file name within the bucket or directory (plain or gzip FASTA)
    #[arg(required_unless_present_any = ["list_patterns", "folder"])]
    pub file_name: Option<String>,

    /// Scan every *.protein.faa.gz file below the local directory given as bucket_or_path, one
    /// pass and one result file per corpus file
    #[arg(long, conflicts_with_all = ["file_name", "output"])]
    pub folder: bool,

    /// Directory for the per-file results of --folder
    #[arg(long, value_name = "DIR", requires = "folder")]
    pub output_dir: Option<PathBuf>,

    /// Pattern class to search for; repeat for several, or use "all"
    #[arg(long = "pattern", value_name = "NAME")]
    pub patterns: Vec<String>,

    /// Result file; a .gz extension compresses it
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Stop after this many sequences
    #[arg(long, value_name = "N")]
    pub max_sequences: Option<usize>,

    /// Read the corpus from the local filesystem instead of the object store
    #[arg(long)]
    pub local: bool,

    /// Do not publish the result file
    #[arg(long)]
    pub no_upload: bool,

    /// Extra pattern as NAME=REGEX; searched alone unless --pattern is also given
    #[arg(long, value_name = "NAME=REGEX")]
    pub custom_pattern: Option<String>,

    /// Expected repeat length of --custom-pattern
    #[arg(long, value_name = "N", requires = "custom_pattern")]
    pub custom_length: Option<usize>,

    /// YAML or JSON file of patterns that replace or extend the built-in table
    #[arg(long, value_name = "FILE")]
    pub patterns_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Add the record description as the last column
    #[arg(long)]
    pub with_description: bool,

    /// Log progress every N sequences
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LOG_INTERVAL)]
    pub log_interval: usize,

    /// Bucket to publish to when reading with --local
    #[arg(long, value_name = "BUCKET")]
    pub upload_bucket: Option<String>,

    /// Print the pattern table as YAML and exit
    #[arg(long)]
    pub list_patterns: bool,
}

/// Run scans in detached, reattachable terminal sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "lrr-sessions", version)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Start one scan session per pattern class
    Launch(LaunchArgs),
    /// List running sessions
    List,
    /// Attach the terminal to a session
    Attach { name: String },
    /// Terminate a session
    Kill { name: String },
}

#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
    pub bucket_or_path: String,

    pub file_name: String,

    /// Pattern classes to launch; defaults to every class
    #[arg(long = "pattern", value_name = "NAME")]
    pub patterns: Vec<String>,

    #[arg(long)]
    pub local: bool,

    #[arg(long)]
    pub no_upload: bool,

    #[arg(long, value_name = "N")]
    pub max_sequences: Option<usize>,

    /// Directory for the per-class result files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Scanner command run inside each session
    #[arg(long, value_name = "CMD", default_value = "lrr-scan")]
    pub scanner: String,
}
