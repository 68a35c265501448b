//! Folder runs: one sequential pass per corpus file found below a directory.
//!
//! RefSeq protein sets ship as many `*.protein.faa.gz` files. Each file gets its own [`Job`] and
//! its own result file, `<base>_<pattern-or-all>.tsv`, in the output directory. A file that fails
//! is logged and the remaining files are still scanned.

use std::path::{Path, PathBuf};

use log::{error, info};
use walkdir::WalkDir;

use crate::cli::ScanArgs;
use crate::errors::*;
use crate::job::*;
use crate::storage::*;

pub const CORPUS_SUFFIX: &str = ".protein.faa.gz";

/// Every corpus file below `dir`, in path order.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let unavailable = |reason: String| Error::SourceUnavailable {
        source_name: dir.display().to_string(),
        reason,
    };

    if !dir.is_dir() {
        return Err(unavailable("not a directory".to_owned()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| unavailable(e.to_string()))?;
        let is_corpus = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.ends_with(CORPUS_SUFFIX));

        if entry.file_type().is_file() && is_corpus {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(unavailable(format!("no *{CORPUS_SUFFIX} files found")));
    }
    Ok(files)
}

/// File name without the corpus suffix, e.g. `GCF_000001405.40` for
/// `GCF_000001405.40.protein.faa.gz`.
pub fn corpus_base_name(file: &Path) -> String {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = name.strip_suffix(".faa.gz").unwrap_or(&name);
    name.strip_suffix(".protein").unwrap_or(name).to_owned()
}

/// Plan one run per corpus file below the directory given as `bucket_or_path`.
pub fn folder_configs(args: &ScanArgs) -> Result<Vec<RunConfig>> {
    let Some(dir) = &args.bucket_or_path else {
        return Err(Error::Config("a corpus directory is required".to_owned()));
    };

    let patterns = validated_patterns(args)?;
    let files = corpus_files(Path::new(dir))?;
    info!("Found {} {CORPUS_SUFFIX} files in {dir}", files.len());

    let output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let label = pattern_label(&patterns).to_owned();
    let publish_to = if args.no_upload {
        None
    } else {
        args.upload_bucket.clone()
    };

    Ok(files
        .into_iter()
        .map(|file| {
            let output_path = output_dir.join(format!(
                "{}_{label}.{}",
                corpus_base_name(&file),
                output_extension(args.format)
            ));
            RunConfig::with_source(
                args,
                patterns.clone(),
                Source::Local(file),
                publish_to.clone(),
                output_path,
            )
        })
        .collect())
}

/// Outcome of a folder run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<JobReport>,
    pub failed: Vec<(Source, Error)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    /// `Ok` when every file completed, otherwise an error naming how many did not.
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(Error::BatchIncomplete {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }
}

/// Run each planned pass in turn.
pub fn run_batch(configs: &[RunConfig], storage: &dyn Storage) -> BatchReport {
    let mut report = BatchReport::default();

    for (i, config) in configs.iter().enumerate() {
        info!("File {}/{}: {}", i + 1, configs.len(), config.source);

        match Job::new(config).run(storage) {
            Ok(r) => report.completed.push(r),
            Err(e) => {
                error!("{}: {e}", config.source);
                report.failed.push((config.source.clone(), e));
            }
        }
    }

    info!(
        "Scanned {} of {} files",
        report.completed.len(),
        report.total()
    );
    report
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn base_names_drop_the_corpus_suffix() {
        assert_eq!(
            corpus_base_name(Path::new("refseq/GCF_000001405.40.protein.faa.gz")),
            "GCF_000001405.40"
        );
        assert_eq!(corpus_base_name(Path::new("x.faa.gz")), "x");
    }

    #[test]
    fn only_corpus_files_are_planned() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.protein.faa.gz", "nested/a.protein.faa.gz", "notes.txt", "c.faa.gz"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let args = ScanArgs::try_parse_from([
            "lrr-scan",
            dir.path().to_str().unwrap(),
            "--folder",
            "--output-dir",
            "results",
            "--pattern",
            "RI-like",
        ])
        .unwrap();
        let configs = folder_configs(&args).unwrap();

        let outputs = configs
            .iter()
            .map(|c| c.output_path.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            outputs,
            [
                Path::new("results").join("b_RI-like.tsv"),
                Path::new("results").join("a_RI-like.tsv"),
            ]
        );
        assert!(configs.iter().all(|c| c.local_only && c.publish_to.is_none()));
        assert_eq!(
            configs[1].source,
            Source::Local(dir.path().join("nested").join("a.protein.faa.gz"))
        );
    }

    #[test]
    fn empty_folder_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            corpus_files(dir.path()),
            Err(Error::SourceUnavailable { .. })
        ));
        assert!(matches!(
            corpus_files(&dir.path().join("absent")),
            Err(Error::SourceUnavailable { .. })
        ));
    }
}
