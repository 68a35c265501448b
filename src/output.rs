//! Result artifacts.
//!
//! A [`ResultWriter`] appends hits to a local file as they are found and, once the file is
//! complete and flushed, optionally publishes it through a [`Storage`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::{write::GzEncoder, Compression};
use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::errors::*;
use crate::patterns::PatternSpec;
use crate::record::*;
use crate::storage::Storage;

/// Rows between flushes of compressed output. Each flush ends a deflate block with a sync
/// marker, so doing it per record would cost compression on large runs.
const GZIP_FLUSH_ROWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One tab-separated row per match.
    #[default]
    Matches,
    /// One tab-separated row per record and pattern with at least one match.
    Summary,
    /// One JSON object per match.
    Jsonl,
}

impl OutputFormat {
    fn header(self, with_description: bool) -> Option<Vec<&'static str>> {
        let mut header = match self {
            OutputFormat::Matches => vec![
                "record_id",
                "pattern_name",
                "start_offset",
                "end_offset",
                "matched_text",
            ],
            OutputFormat::Summary => vec![
                "record_id",
                "pattern_name",
                "count",
                "total_repeat_length",
                "sequence_length",
                "matched_texts",
            ],
            OutputFormat::Jsonl => return None,
        };

        if with_description {
            header.push("description");
        }
        Some(header)
    }
}

/// Hits of one pattern within one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub record_id: String,
    pub pattern_name: String,
    pub count: usize,
    pub total_repeat_length: usize,
    pub sequence_length: usize,
    pub matched_texts: Vec<String>,
    pub description: Option<String>,
}

/// Group a record's matches by pattern, in pattern order.
pub fn summarize(
    record: &SequenceRecord,
    patterns: &[PatternSpec],
    matches: &[Match],
) -> Vec<RecordSummary> {
    let mut by_pattern: FxHashMap<&str, Vec<&Match>> = FxHashMap::default();
    for m in matches {
        by_pattern.entry(m.pattern_name.as_str()).or_default().push(m);
    }

    patterns
        .iter()
        .filter_map(|p| {
            let hits = by_pattern.get(p.name())?;
            Some(RecordSummary {
                record_id: record.id().to_owned(),
                pattern_name: p.name().to_owned(),
                count: hits.len(),
                total_repeat_length: hits.len() * p.repeat_length(),
                sequence_length: record.len(),
                matched_texts: hits.iter().map(|m| m.matched_text.clone()).collect(),
                description: hits[0].description.clone(),
            })
        })
        .collect()
}

/// Where the finished artifact ended up.
#[derive(Debug)]
pub enum Publication {
    /// Publishing was not requested.
    Skipped,
    Published { destination: String },
    /// The local artifact is intact but could not be published.
    Failed(Error),
}

#[derive(Debug)]
pub struct Finalized {
    pub path: PathBuf,
    pub rows: usize,
    pub publication: Publication,
}

enum Artifact {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl Artifact {
    fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        if path.extension().is_some_and(|e| e == "gz") {
            Ok(Artifact::Gzip(BufWriter::new(GzEncoder::new(
                file,
                Compression::default(),
            ))))
        } else {
            Ok(Artifact::Plain(BufWriter::new(file)))
        }
    }

    fn is_compressed(&self) -> bool {
        matches!(self, Artifact::Gzip(_))
    }

    fn finish(self) -> std::io::Result<()> {
        match self {
            Artifact::Plain(w) => w.into_inner().map_err(|e| e.into_error())?.sync_all(),
            Artifact::Gzip(w) => w
                .into_inner()
                .map_err(|e| e.into_error())?
                .finish()?
                .sync_all(),
        }
    }
}

impl Write for Artifact {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Artifact::Plain(w) => w.write(buf),
            Artifact::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Artifact::Plain(w) => w.flush(),
            // sync-flushes the encoder; the member trailer is only written by finish
            Artifact::Gzip(w) => w.flush(),
        }
    }
}

enum Sink {
    Delimited(csv::Writer<Artifact>),
    Jsonl(Artifact),
}

pub struct ResultWriter {
    path: PathBuf,
    format: OutputFormat,
    with_description: bool,
    sink: Sink,
    compressed: bool,
    rows: usize,
    flushed_rows: usize,
}

impl ResultWriter {
    /// Create (or truncate) the local artifact. Parent directories are created as needed and a
    /// `.gz` extension selects gzip compression.
    pub fn create(
        path: impl AsRef<Path>,
        format: OutputFormat,
        with_description: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let artifact = Artifact::create(&path).map_err(|e| write_err(&path, e))?;
        let compressed = artifact.is_compressed();

        let sink = match format.header(with_description) {
            Some(header) => {
                let mut w = csv::WriterBuilder::new()
                    .delimiter(b'\t')
                    .quote_style(csv::QuoteStyle::Never)
                    .has_headers(false)
                    .from_writer(artifact);
                w.write_record(&header).map_err(|e| write_err(&path, e))?;
                Sink::Delimited(w)
            }
            None => Sink::Jsonl(artifact),
        };

        Ok(Self {
            path,
            format,
            with_description,
            sink,
            compressed,
            rows: 0,
            flushed_rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of rows written, not counting the header.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append one match. Not valid for [`OutputFormat::Summary`], which needs whole records.
    pub fn record(&mut self, m: &Match) -> Result<()> {
        match &mut self.sink {
            Sink::Delimited(w) => {
                if self.format == OutputFormat::Summary {
                    return Err(Error::Config(
                        "summary output is written per record, not per match".to_owned(),
                    ));
                }

                let start = m.start_offset.to_string();
                let end = m.end_offset.to_string();
                let mut row = vec![
                    clean(&m.record_id),
                    clean(&m.pattern_name),
                    start.as_str().into(),
                    end.as_str().into(),
                    clean(&m.matched_text),
                ];
                if self.with_description {
                    row.push(clean(m.description.as_deref().unwrap_or("")));
                }
                w.write_record(row.iter().map(|f| f.as_bytes()))
                    .map_err(|e| write_err(&self.path, e))?;
            }
            Sink::Jsonl(w) => {
                serde_json::to_writer(&mut *w, m).map_err(|e| write_err(&self.path, e))?;
                writeln!(w).map_err(|e| write_err(&self.path, e))?;
            }
        }

        self.rows += 1;
        Ok(())
    }

    /// Append one per-record summary row.
    pub fn record_summary(&mut self, s: &RecordSummary) -> Result<()> {
        match &mut self.sink {
            Sink::Delimited(w) if self.format == OutputFormat::Summary => {
                let count = s.count.to_string();
                let total = s.total_repeat_length.to_string();
                let len = s.sequence_length.to_string();
                let texts = s.matched_texts.join(" ");
                let mut row = vec![
                    clean(&s.record_id),
                    clean(&s.pattern_name),
                    count.as_str().into(),
                    total.as_str().into(),
                    len.as_str().into(),
                    clean(&texts),
                ];
                if self.with_description {
                    row.push(clean(s.description.as_deref().unwrap_or("")));
                }
                w.write_record(row.iter().map(|f| f.as_bytes()))
                    .map_err(|e| write_err(&self.path, e))?;
            }
            _ => {
                return Err(Error::Config(format!(
                    "summary rows cannot be written as {:?} output",
                    self.format
                )))
            }
        }

        self.rows += 1;
        Ok(())
    }

    /// Append all hits of one record in the configured format.
    ///
    /// Plain output is pushed to the file after every record, so an interrupted run leaves whole
    /// rows behind. Compressed output is flushed every [`GZIP_FLUSH_ROWS`] rows instead.
    pub fn write_hits(
        &mut self,
        record: &SequenceRecord,
        patterns: &[PatternSpec],
        matches: &[Match],
    ) -> Result<()> {
        if matches.is_empty() {
            return Ok(());
        }

        if self.format == OutputFormat::Summary {
            for s in summarize(record, patterns, matches) {
                self.record_summary(&s)?;
            }
        } else {
            for m in matches {
                self.record(m)?;
            }
        }

        if !self.compressed || self.rows - self.flushed_rows >= GZIP_FLUSH_ROWS {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Delimited(w) => w.flush(),
            Sink::Jsonl(w) => w.flush(),
        }
        .map_err(|e| write_err(&self.path, e))?;

        self.flushed_rows = self.rows;
        Ok(())
    }

    /// Complete the local file, then publish it to `publish_to` if given.
    ///
    /// A local write failure is an error. A publish failure is not: it is logged and reported in
    /// the returned [`Publication`], and the local file is kept.
    pub fn finalize(self, publish_to: Option<(&dyn Storage, &str)>) -> Result<Finalized> {
        let Self {
            path, sink, rows, ..
        } = self;

        let artifact = match sink {
            Sink::Delimited(w) => w.into_inner().map_err(|e| write_err(&path, e.into_error()))?,
            Sink::Jsonl(a) => a,
        };
        artifact.finish().map_err(|e| write_err(&path, e))?;
        info!("Wrote {rows} rows to {}", path.display());

        let publication = match publish_to {
            None => Publication::Skipped,
            Some((storage, destination)) => match storage.publish(&path, destination) {
                Ok(()) => {
                    info!("Published {} to {destination}", path.display());
                    Publication::Published {
                        destination: destination.to_owned(),
                    }
                }
                Err(e) => {
                    warn!("{e}; local copy kept at {}", path.display());
                    Publication::Failed(e)
                }
            },
        };

        Ok(Finalized {
            path,
            rows,
            publication,
        })
    }
}

fn write_err(path: &Path, e: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Write {
        file: path.to_owned(),
        source: Box::new(e),
    }
}

// fields are unquoted, so separators inside them would shift columns
fn clean(field: &str) -> std::borrow::Cow<'_, str> {
    let is_separator = |c: char| matches!(c, '\t' | '\n' | '\r');
    if field.contains(is_separator) {
        field.replace(is_separator, " ").into()
    } else {
        field.into()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;
    use crate::patterns::PatternTable;

    fn hit(id: &str, pattern: &str, start: usize, text: &str) -> Match {
        Match {
            record_id: id.to_owned(),
            pattern_name: pattern.to_owned(),
            start_offset: start,
            end_offset: start + text.len(),
            matched_text: text.to_owned(),
            description: None,
        }
    }

    fn read_matches(path: &Path) -> Vec<Match> {
        csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .unwrap()
            .deserialize()
            .collect::<std::result::Result<Vec<Match>, _>>()
            .unwrap()
    }

    #[test]
    fn matches_read_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/hits.tsv");
        let hits = vec![
            hit("P1", "TpLRR", 5, "CGGLGGIGLGGGLGGIGGGAF"),
            hit("P1", "TpLRR", 40, "NGGLGGIGLGGGLGGIGGGAF"),
            hit("Q9", "Bacterial", 0, "PGGLGGLGVGGNGLGGLPGL"),
        ];

        let mut w = ResultWriter::create(&path, OutputFormat::Matches, false).unwrap();
        for h in &hits {
            w.record(h).unwrap();
        }
        let done = w.finalize(None).unwrap();

        assert_eq!(done.rows, 3);
        assert!(matches!(done.publication, Publication::Skipped));
        assert_eq!(read_matches(&path), hits);
    }

    #[test]
    fn description_column_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.tsv");
        let mut h = hit("P1", "TpLRR", 0, "AF");
        h.description = Some("tab\tinside".to_owned());

        let mut w = ResultWriter::create(&path, OutputFormat::Matches, true).unwrap();
        w.record(&h).unwrap();
        w.finalize(None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            [
                "record_id\tpattern_name\tstart_offset\tend_offset\tmatched_text\tdescription",
                "P1\tTpLRR\t0\t2\tAF\ttab inside",
            ]
        );
    }

    #[test]
    fn summary_rows_group_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.tsv");
        let table = PatternTable::builtin();
        let patterns = table.select(&["TpLRR", "Bacterial"]).unwrap();
        let record = SequenceRecord::new("P1", "", vec![b'A'; 100]);
        let hits = vec![hit("P1", "TpLRR", 0, "X"), hit("P1", "TpLRR", 30, "Y")];

        let mut w = ResultWriter::create(&path, OutputFormat::Summary, false).unwrap();
        assert!(w.record(&hits[0]).is_err());
        w.write_hits(&record, &patterns, &hits).unwrap();
        w.write_hits(&record, &patterns, &[]).unwrap();
        assert_eq!(w.rows(), 1);
        w.finalize(None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(1), Some("P1\tTpLRR\t2\t42\t100\tX Y"));
    }

    #[test]
    fn jsonl_and_gzip_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.jsonl.gz");

        let mut w = ResultWriter::create(&path, OutputFormat::Jsonl, false).unwrap();
        w.record(&hit("P1", "TpLRR", 3, "AF")).unwrap();
        w.flush().unwrap();
        w.finalize(None).unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        let m: Match = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(m, hit("P1", "TpLRR", 3, "AF"));
    }

    #[test]
    fn plain_hits_reach_disk_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.tsv");
        let record = SequenceRecord::new("P1", "", "AF");

        let mut w = ResultWriter::create(&path, OutputFormat::Matches, false).unwrap();
        w.write_hits(&record, &[], &[hit("P1", "TpLRR", 0, "AF")])
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(1), Some("P1\tTpLRR\t0\t2\tAF"));
        w.finalize(None).unwrap();
    }

    #[test]
    fn gzip_hits_are_not_flushed_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.tsv.gz");
        let record = SequenceRecord::new("P1", "", "AF");

        let mut w = ResultWriter::create(&path, OutputFormat::Matches, false).unwrap();
        w.write_hits(&record, &[], &[hit("P1", "TpLRR", 0, "AF")])
            .unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        w.finalize(None).unwrap();

        let mut text = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn unwritable_output_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let err = ResultWriter::create(blocker.join("hits.tsv"), OutputFormat::Matches, false)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Write { .. }));
    }
}
