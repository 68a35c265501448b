//! One scanning pass: source to scanner to result file.

use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::cli::ScanArgs;
use crate::errors::*;
use crate::iter::*;
use crate::output::*;
use crate::patterns::{PatternSpec, PatternTable};
use crate::scan::Scanner;
use crate::storage::*;

/// Validated settings for a run. Built once, before any I/O, and never changed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: Source,
    pub patterns: Vec<PatternSpec>,
    pub max_sequences: Option<usize>,
    pub local_only: bool,
    pub no_upload: bool,
    /// Bucket (or directory) to publish the result to, if publishing is possible.
    pub publish_to: Option<String>,
    pub output_path: PathBuf,
    pub format: OutputFormat,
    pub with_description: bool,
    pub progress_interval: usize,
}

impl RunConfig {
    /// Validate a single-file invocation.
    pub fn from_args(args: &ScanArgs) -> Result<Self> {
        let (Some(bucket_or_path), Some(file_name)) = (&args.bucket_or_path, &args.file_name)
        else {
            return Err(Error::Config(
                "a bucket (or directory) and a file name are required".to_owned(),
            ));
        };

        let patterns = validated_patterns(args)?;

        let source = if args.local {
            Source::Local(Path::new(bucket_or_path).join(file_name))
        } else {
            Source::Object {
                bucket: bucket_or_path.clone(),
                key: file_name.clone(),
            }
        };

        let publish_to = if args.no_upload {
            None
        } else if args.local {
            args.upload_bucket.clone()
        } else {
            Some(
                args.upload_bucket
                    .clone()
                    .unwrap_or_else(|| bucket_or_path.clone()),
            )
        };

        let output_path = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&patterns, args.format));

        Ok(Self::with_source(args, patterns, source, publish_to, output_path))
    }

    /// Settings shared by every run of one invocation, around a per-run source and output.
    pub(crate) fn with_source(
        args: &ScanArgs,
        patterns: Vec<PatternSpec>,
        source: Source,
        publish_to: Option<String>,
        output_path: PathBuf,
    ) -> Self {
        Self {
            local_only: matches!(source, Source::Local(_)),
            source,
            patterns,
            max_sequences: args.max_sequences,
            no_upload: args.no_upload,
            publish_to,
            output_path,
            format: args.format,
            with_description: args.with_description,
            progress_interval: args.log_interval,
        }
    }

    /// Whether the source or the publish target lives in the object store.
    pub fn needs_object_store(&self) -> bool {
        matches!(self.source, Source::Object { .. }) || self.publish_to.is_some()
    }

    pub fn pattern_names(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.name()).collect()
    }
}

/// Check numeric bounds and resolve the requested patterns.
pub(crate) fn validated_patterns(args: &ScanArgs) -> Result<Vec<PatternSpec>> {
    if args.max_sequences == Some(0) {
        return Err(Error::Config("--max-sequences must be at least 1".to_owned()));
    }
    if args.log_interval == 0 {
        return Err(Error::Config("--log-interval must be at least 1".to_owned()));
    }

    let table = pattern_table(args)?;
    match (&args.custom_pattern, args.patterns.is_empty()) {
        (Some(custom), true) => Ok(vec![table.lookup(custom_name(custom)?)?.clone()]),
        _ => table.select(&args.patterns),
    }
}

/// The pattern table a run resolves names against: built-ins, then the pattern file, then any
/// custom expression.
pub fn pattern_table(args: &ScanArgs) -> Result<PatternTable> {
    let mut overrides = match &args.patterns_file {
        Some(file) => PatternTable::load_entries(file)?,
        None => Vec::new(),
    };

    if let Some(custom) = &args.custom_pattern {
        let name = custom_name(custom)?;
        let expression = &custom[name.len() + 1..];
        let length = args.custom_length.unwrap_or(0);
        overrides.push(PatternSpec::new(name, expression, length, "custom pattern")?);
    }

    if overrides.is_empty() {
        Ok(PatternTable::builtin().clone())
    } else {
        PatternTable::builtin().with_overrides(overrides)
    }
}

fn custom_name(custom: &str) -> Result<&str> {
    match custom.split_once('=') {
        Some((name, expression)) if !name.is_empty() && !expression.is_empty() => Ok(name),
        _ => Err(Error::Config(format!(
            "custom pattern \"{custom}\" must look like NAME=REGEX"
        ))),
    }
}

/// `TpLRR` for a single pattern, `all` otherwise.
pub(crate) fn pattern_label(patterns: &[PatternSpec]) -> &str {
    match patterns {
        [p] => p.name(),
        _ => "all",
    }
}

pub(crate) fn output_extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Jsonl => "jsonl",
        _ => "tsv",
    }
}

fn default_output_path(patterns: &[PatternSpec], format: OutputFormat) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!(
        "{}_data_{timestamp}.{}",
        pattern_label(patterns),
        output_extension(format)
    ))
}

/// Pick the storage backend for a set of runs, probing for the object store tool once.
///
/// Without the tool, a remote source is fatal while a remote publish target is dropped with a
/// warning, leaving local-only runs.
pub fn resolve_storage(configs: &mut [RunConfig]) -> Result<Box<dyn Storage>> {
    if !configs.iter().any(RunConfig::needs_object_store) {
        return Ok(Box::new(LocalStorage));
    }

    let gsutil = GsutilStorage::default();
    if gsutil.available() {
        return Ok(Box::new(gsutil));
    }

    if let Some(remote) = configs
        .iter()
        .find(|c| matches!(c.source, Source::Object { .. }))
    {
        return Err(Error::SourceUnavailable {
            source_name: remote.source.to_string(),
            reason: "gsutil is not installed or not on PATH".to_owned(),
        });
    }

    warn!("gsutil is not installed or not on PATH; results will not be published");
    for config in configs.iter_mut() {
        config.publish_to = None;
    }
    Ok(Box::new(LocalStorage))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Initializing,
    Streaming,
    Finalizing,
    Done,
    /// Local result complete, publishing failed.
    DoneWithWarning,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug)]
pub struct JobReport {
    pub state: JobState,
    pub records_processed: usize,
    pub records_skipped: usize,
    pub records_with_matches: usize,
    pub matches: usize,
    pub limit_reached: bool,
    pub output_path: PathBuf,
    pub publication: Publication,
}

impl JobReport {
    pub fn published(&self) -> bool {
        matches!(self.publication, Publication::Published { .. })
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: processed {} sequences ({} skipped as malformed), found {} matches in {} sequences, results in {}",
            self.state,
            self.records_processed,
            self.records_skipped,
            self.matches,
            self.records_with_matches,
            self.output_path.display()
        )
    }
}

pub struct Job<'a> {
    config: &'a RunConfig,
    state: JobState,
}

impl<'a> Job<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            state: JobState::Initializing,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn enter(&mut self, state: JobState) {
        debug!("{} -> {}", self.state, state);
        self.state = state;
    }

    /// Run a single pass over the source.
    ///
    /// The source is opened before the result file is created, so setup failures leave no
    /// output behind. A failure while streaming keeps the rows written so far.
    pub fn run(&mut self, storage: &dyn Storage) -> Result<JobReport> {
        let config = self.config;
        info!(
            "Searching for {} patterns in {}",
            config.pattern_names().join(", "),
            config.source
        );

        let with_matches = Cell::new(0);
        let mut seen = 0;
        let mut records = FastaRecords::open(storage, &config.source)
            .inspect_err(|_| self.enter(JobState::Failed))?
            .take_records(config.max_sequences.unwrap_or(usize::MAX))
            .inspect_records(|_| {
                seen += 1;
                if seen % config.progress_interval == 0 {
                    info!(
                        "Processed {seen} sequences, found {} with patterns",
                        with_matches.get()
                    );
                }
            });
        let mut writer =
            ResultWriter::create(&config.output_path, config.format, config.with_description)
                .inspect_err(|_| self.enter(JobState::Failed))?;
        let scanner = Scanner::new(config.patterns.iter().cloned())
            .with_description(config.with_description);

        self.enter(JobState::Streaming);
        let mut processed = 0;
        let mut total = 0;

        let streamed = loop {
            let record = match records.next_record() {
                Ok(Some(r)) => r,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            processed += 1;

            let matches = scanner.scan(&record);
            if !matches.is_empty() {
                with_matches.set(with_matches.get() + 1);
                total += matches.len();
                if let Err(e) = writer.write_hits(&record, scanner.patterns(), &matches) {
                    break Err(e);
                }
            }
        };

        if let Err(e) = streamed.and_then(|()| records.finish()) {
            self.enter(JobState::Failed);
            error!("Scan stopped after {processed} sequences: {e}");
            if let Err(flush_err) = writer.finalize(None) {
                error!("{flush_err}");
            }
            return Err(e);
        }

        let limit_reached = records.inner().limit_reached();
        if limit_reached {
            info!("Reached maximum sequence count ({processed})");
        }

        self.enter(JobState::Finalizing);
        let publish_to = config
            .publish_to
            .as_deref()
            .map(|destination| (storage, destination));
        let finalized = writer
            .finalize(publish_to)
            .inspect_err(|_| self.enter(JobState::Failed))?;

        self.enter(match finalized.publication {
            Publication::Failed(_) => JobState::DoneWithWarning,
            _ => JobState::Done,
        });

        let report = JobReport {
            state: self.state,
            records_processed: processed,
            records_skipped: records.skipped(),
            records_with_matches: with_matches.get(),
            matches: total,
            limit_reached,
            output_path: finalized.path,
            publication: finalized.publication,
        };
        info!("{report}");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> ScanArgs {
        let mut argv = vec!["lrr-scan", "bucket", "uniref50.fasta.gz"];
        argv.extend_from_slice(extra);
        ScanArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn remote_run_publishes_to_source_bucket() {
        let config = RunConfig::from_args(&args(&["--pattern", "TpLRR"])).unwrap();

        assert_eq!(
            config.source,
            Source::Object {
                bucket: "bucket".to_owned(),
                key: "uniref50.fasta.gz".to_owned()
            }
        );
        assert_eq!(config.publish_to.as_deref(), Some("bucket"));
        assert_eq!(config.pattern_names(), ["TpLRR"]);
        assert!(config.needs_object_store());

        let name = config.output_path.to_string_lossy().into_owned();
        assert!(name.starts_with("TpLRR_data_"), "{name}");
        assert!(name.ends_with(".tsv"), "{name}");
    }

    #[test]
    fn local_run_joins_path_and_skips_publish() {
        let config = RunConfig::from_args(&args(&["--local", "--output", "x.tsv"])).unwrap();

        assert_eq!(
            config.source,
            Source::Local(Path::new("bucket").join("uniref50.fasta.gz"))
        );
        assert_eq!(config.publish_to, None);
        assert_eq!(config.patterns.len(), 8);
        assert!(!config.needs_object_store());

        let config =
            RunConfig::from_args(&args(&["--local", "--upload-bucket", "results"])).unwrap();
        assert_eq!(config.publish_to.as_deref(), Some("results"));

        let config = RunConfig::from_args(&args(&["--no-upload"])).unwrap();
        assert_eq!(config.publish_to, None);
    }

    #[test]
    fn custom_pattern_is_searched_alone() {
        let config = RunConfig::from_args(&args(&[
            "--custom-pattern",
            "BspA=C.{2}L.{2}I.{1}L.{3}L.{2}I.{3}AF",
            "--custom-length",
            "21",
        ]))
        .unwrap();

        assert_eq!(config.pattern_names(), ["BspA"]);
        assert_eq!(config.patterns[0].repeat_length(), 21);

        let config = RunConfig::from_args(&args(&[
            "--custom-pattern",
            "BspA=C.{2}L",
            "--pattern",
            "BspA",
            "--pattern",
            "TpLRR",
        ]))
        .unwrap();
        assert_eq!(config.pattern_names(), ["BspA", "TpLRR"]);
    }

    #[test]
    fn bad_configuration_is_rejected() {
        for extra in [
            &["--pattern", "foo"][..],
            &["--max-sequences", "0"],
            &["--log-interval", "0"],
            &["--custom-pattern", "noequals"],
            &["--custom-pattern", "X=[unclosed"],
        ] {
            let err = RunConfig::from_args(&args(extra)).unwrap_err();
            assert!(err.is_config(), "{extra:?}: {err}");
        }
    }
}
