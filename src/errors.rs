use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Unknown pattern \"{name}\", expected one of: {known}")]
    UnknownPattern { name: String, known: String },
    #[error("Invalid expression for pattern \"{name}\"")]
    InvalidPattern {
        name: String,
        source: regex::Error,
    },
    #[error("Pattern \"{0}\" is defined more than once")]
    DuplicatePattern(String),
    #[error("Error reading pattern table from file: \"{file}\"")]
    PatternFile {
        file: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Source is unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    #[error("Error reading from source: {source_name}")]
    SourceIo {
        source_name: String,
        source: std::io::Error,
    },
    #[error("Malformed record {idx} in {origin} (line {line}): {reason}")]
    MalformedRecord {
        origin: String,
        idx: usize,
        line: usize,
        reason: &'static str,
    },
    #[error("Error writing to output file: \"{file}\"")]
    Write {
        file: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Error publishing \"{file}\" to \"{destination}\": {reason}")]
    Upload {
        file: PathBuf,
        destination: String,
        reason: String,
    },
    #[error("{failed} of {total} corpus files could not be scanned")]
    BatchIncomplete { failed: usize, total: usize },
    #[error("Session \"{0}\" already exists")]
    SessionExists(String),
    #[error("Session \"{0}\" not found")]
    SessionNotFound(String),
    #[error("Session manager failed: {0}")]
    Session(String),
}

impl Error {
    /// Process exit status for a fatal error.
    pub fn exit_code(&self) -> u8 {
        use Error::*;
        match self {
            Config(_) | UnknownPattern { .. } | InvalidPattern { .. } | DuplicatePattern(_)
            | PatternFile { .. } => 2,
            _ => 1,
        }
    }

    pub fn is_config(&self) -> bool {
        self.exit_code() == 2
    }
}
