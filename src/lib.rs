//! Scan protein sequence corpora for leucine-rich repeat (LRR) motifs.
//!
//! # Overview
//! lrrscan streams a (possibly gzip-compressed) multi-FASTA protein corpus, such as UniRef50 or
//! an NCBI RefSeq protein set, from local disk or an object store bucket. It matches every record
//! against one or more LRR class expressions and writes each hit to a delimited result file as
//! soon as it is found.
//!
//! The pieces, leaves first:
//! * [`PatternTable`]: the registry of LRR class expressions ([`LrrClass`]), optionally extended
//!   from a pattern file or a custom expression.
//! * [`FastaRecords`]: a pull-based [`Records`] stream over a [`Source`], opened through a
//!   [`Storage`]. Malformed entries are skipped with a warning.
//! * [`Scanner`]: leftmost-first, non-overlapping regular expression search per record.
//! * [`ResultWriter`]: the local result file, published after it is complete.
//! * [`Job`]: one single-threaded pass wiring the above together from a [`RunConfig`].
//! * [`run_batch`]: one pass after another over every corpus file in a folder.
//! * [`session`]: running one scan per class in detached `tmux` sessions.
//!
//! ## Example
//! ```no_run
//! use lrrscan::*;
//!
//! let patterns = PatternTable::builtin().select(&["TpLRR"]).unwrap();
//! let scanner = Scanner::new(patterns);
//! let source = Source::Local("uniref50.fasta.gz".into());
//! let mut records = FastaRecords::open(&LocalStorage, &source).unwrap().take_records(1000);
//!
//! while let Some(record) = records.next_record().unwrap() {
//!     for m in scanner.scan(&record) {
//!         println!("{}\t{}\t{}", m.record_id, m.start_offset, m.matched_text);
//!     }
//! }
//! ```
//!
//! ## Result files
//! The default layout has one tab-separated row per match:
//! ```text
//! record_id   pattern_name  start_offset  end_offset  matched_text
//! P1          TpLRR         5             26          CGGLGGIGLGGGLGGIGGGAF
//! ```
//! Offsets are zero-based with an exclusive end.

pub mod batch;
pub mod cli;
pub mod errors;
pub mod iter;
pub mod job;
pub mod output;
pub mod patterns;
mod record;
pub mod scan;
pub mod session;
pub mod storage;

// commonly used functions and types

pub use crate::batch::*;
pub use crate::iter::*;
pub use crate::job::*;
pub use crate::output::*;
pub use crate::patterns::*;
pub use crate::record::*;
pub use crate::scan::*;
pub use crate::storage::*;

pub fn trim_ascii_whitespace(b: &[u8]) -> Option<&[u8]> {
    let start = b.iter().position(|&c| !c.is_ascii_whitespace())?;
    let end = b.iter().rposition(|&c| !c.is_ascii_whitespace())?;
    Some(&b[start..=end])
}

/// Names end up in tab-separated output and session names, so they are kept to a small alphabet.
pub fn check_valid_name(b: &[u8]) -> Option<&[u8]> {
    if b.is_empty() {
        return None;
    }

    for &c in b {
        match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => (),
            _ => return None,
        }
    }

    Some(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_both_ends() {
        assert_eq!(trim_ascii_whitespace(b"  >P1 x \r\n"), Some(&b">P1 x"[..]));
        assert_eq!(trim_ascii_whitespace(b" \t\n"), None);
    }

    #[test]
    fn valid_names() {
        assert!(check_valid_name(b"Cysteine-containing").is_some());
        assert!(check_valid_name(b"SDS22_like").is_some());
        assert!(check_valid_name(b"").is_none());
        assert!(check_valid_name(b"a b").is_none());
        assert!(check_valid_name(b"x*").is_none());
    }
}
