use std::io::BufRead;
use std::sync::Arc;

use log::warn;
use memchr::memchr2;

use crate::iter::*;
use crate::storage::{Source, Storage};
use crate::trim_ascii_whitespace;

/// Stream records from a multi-FASTA source.
///
/// Sequence lines may be wrapped at any width. Entries without a usable header or without
/// residues are skipped with a warning instead of failing the stream. Only I/O errors from the
/// underlying reader are returned as errors.
pub struct FastaRecords<R: BufRead> {
    reader: R,
    origin: Arc<Origin>,
    line: Vec<u8>,
    next_header: Option<Vec<u8>>,
    line_number: usize,
    idx: usize,
    skipped: usize,
    finished: bool,
}

impl FastaRecords<Box<dyn BufRead + Send>> {
    /// Open a source from the beginning, decompressing gzip input.
    ///
    /// Every call starts a fresh pass; there is no way to resume partway through.
    pub fn open(storage: &dyn Storage, source: &Source) -> Result<Self> {
        let reader = storage.open(source)?;
        Ok(Self::with_origin(reader, Arc::new(source.origin())))
    }
}

impl<R: BufRead> FastaRecords<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_origin(reader, Arc::new(Origin::Bytes))
    }

    pub fn with_origin(reader: R, origin: Arc<Origin>) -> Self {
        Self {
            reader,
            origin,
            line: Vec::with_capacity(256),
            next_header: None,
            line_number: 0,
            idx: 0,
            skipped: 0,
            finished: false,
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.line)
            .map_err(|e| Error::SourceIo {
                source_name: self.origin.to_string(),
                source: e,
            })?;

        if n == 0 {
            self.finished = true;
            return Ok(false);
        }

        self.line_number += 1;
        Ok(true)
    }

    fn warn_malformed(&mut self, reason: &'static str) {
        let e = Error::MalformedRecord {
            origin: self.origin.to_string(),
            idx: self.idx,
            line: self.line_number,
            reason,
        };
        warn!("{e}, skipping");
        self.skipped += 1;
        self.idx += 1;
    }

    // consume sequence lines up to the next header or end of input
    fn read_residues(&mut self, residues: &mut Vec<u8>) -> Result<()> {
        while !self.finished {
            if !self.read_line()? {
                break;
            }

            let Some(line) = trim_ascii_whitespace(&self.line) else {
                continue;
            };

            if line[0] == b'>' {
                self.next_header = Some(line.to_owned());
                break;
            }

            residues.extend(line.iter().filter(|c| !c.is_ascii_whitespace()));
        }

        Ok(())
    }

    fn next_header(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(header) = self.next_header.take() {
            return Ok(Some(header));
        }

        while !self.finished {
            if !self.read_line()? {
                break;
            }

            let Some(line) = trim_ascii_whitespace(&self.line) else {
                continue;
            };

            if line[0] == b'>' {
                return Ok(Some(line.to_owned()));
            }

            // residues with no header in front of them
            let mut orphan = line.to_owned();
            self.read_residues(&mut orphan)?;
            self.warn_malformed("sequence data without a header");

            if let Some(header) = self.next_header.take() {
                return Ok(Some(header));
            }
        }

        Ok(None)
    }
}

impl<R: BufRead> Records for FastaRecords<R> {
    fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        loop {
            let Some(header) = self.next_header()? else {
                return Ok(None);
            };

            let mut residues = Vec::new();
            self.read_residues(&mut residues)?;

            let Some(header) = trim_ascii_whitespace(&header[1..]) else {
                self.warn_malformed("empty header");
                continue;
            };

            if residues.is_empty() {
                self.warn_malformed("empty sequence");
                continue;
            }

            let (id, description) = match memchr2(b' ', b'\t', header) {
                Some(i) => (
                    &header[..i],
                    trim_ascii_whitespace(&header[i..]).unwrap_or(&[]),
                ),
                None => (header, &[][..]),
            };

            let record = SequenceRecord::with_origin(
                String::from_utf8_lossy(id),
                String::from_utf8_lossy(description),
                residues,
                Arc::clone(&self.origin),
                self.idx,
            );
            self.idx += 1;

            return Ok(Some(record));
        }
    }

    fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn collect(text: &str) -> (Vec<SequenceRecord>, usize) {
        let mut records = FastaRecords::from_reader(Cursor::new(text.as_bytes().to_vec()));
        let mut res = Vec::new();
        while let Some(r) = records.next_record().unwrap() {
            res.push(r);
        }
        (res, records.skipped())
    }

    #[test]
    fn wrapped_sequences_and_descriptions() {
        let (records, skipped) = collect(
            ">UniRef50_A0A1 Leucine-rich repeat protein n=2 Tax=Treponema\nMKLL\nAFCN\r\n\n>P2\nmkll\n",
        );

        assert_eq!(skipped, 0);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "UniRef50_A0A1");
        assert_eq!(
            records[0].description(),
            "Leucine-rich repeat protein n=2 Tax=Treponema"
        );
        assert_eq!(records[0].residues(), b"MKLLAFCN");
        assert_eq!(records[1].id(), "P2");
        assert_eq!(records[1].description(), "");
        assert_eq!(records[1].residues(), b"mkll");
        assert_eq!(records[1].idx(), 1);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let (records, skipped) = collect(
            "MKLLAF\nGG\n>P1 ok\nMKV\n>P2 empty\n>\nMKV\n>P3\nLLAF\n>P4 trailing empty\n",
        );

        let ids = records.iter().map(|r| r.id()).collect::<Vec<_>>();
        assert_eq!(ids, ["P1", "P3"]);
        assert_eq!(skipped, 4);
    }

    #[test]
    fn headerless_prefix_keeps_following_records() {
        let (records, skipped) = collect("GARBAGE\n>P1 ok\nMKV\n>P2\nLLAF\n");

        let ids = records.iter().map(|r| r.id()).collect::<Vec<_>>();
        assert_eq!(ids, ["P1", "P2"]);
        assert_eq!(records[1].residues(), b"LLAF");
        assert_eq!(skipped, 1);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (records, skipped) = collect("");
        assert!(records.is_empty());
        assert_eq!(skipped, 0);

        let (records, _) = collect("\n\n  \n");
        assert!(records.is_empty());
    }

    #[test]
    fn take_stops_at_limit() {
        let text = ">A\nM\n>B\nM\n>C\nM\n";
        let mut records = FastaRecords::from_reader(Cursor::new(text)).take_records(2);
        assert_eq!(records.next_record().unwrap().unwrap().id(), "A");
        assert_eq!(records.next_record().unwrap().unwrap().id(), "B");
        assert!(!records.limit_reached());
        assert!(records.next_record().unwrap().is_none());
        assert!(records.limit_reached());
    }

    #[test]
    fn take_of_exact_size_is_not_truncated() {
        let text = ">A\nM\n>B\nM\n";
        let mut records = FastaRecords::from_reader(Cursor::new(text)).take_records(2);
        while records.next_record().unwrap().is_some() {}
        assert!(!records.limit_reached());

        let mut records = FastaRecords::from_reader(Cursor::new(text)).take_records(5);
        while records.next_record().unwrap().is_some() {}
        assert!(!records.limit_reached());
    }

    #[test]
    fn inspect_sees_every_record() {
        let text = ">A\nM\n>B\nM\n";
        let mut seen = Vec::new();
        {
            let mut records =
                FastaRecords::from_reader(Cursor::new(text)).inspect_records(|r| seen.push(r.id().to_owned()));
            while records.next_record().unwrap().is_some() {}
        }
        assert_eq!(seen, ["A", "B"]);
    }
}
