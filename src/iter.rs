//! Pull-based record streams.
//!
//! A [`Records`] source hands out one [`SequenceRecord`] at a time, so memory stays bounded by
//! the largest record regardless of corpus size. Adapters wrap another source and are chained
//! with the provided methods, e.g. `FastaRecords::open(&storage, &source)?.take_records(1000)`.

use crate::errors::*;
use crate::record::*;

mod fasta_records;
pub use fasta_records::*;

mod take_records;
pub use take_records::*;

mod inspect_records;
pub use inspect_records::*;

pub trait Records {
    /// The next record, or `None` once the stream is exhausted.
    fn next_record(&mut self) -> Result<Option<SequenceRecord>>;

    /// Release the underlying source.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Number of malformed entries skipped so far.
    fn skipped(&self) -> usize {
        0
    }

    /// Stop after `limit` records.
    fn take_records(self, limit: usize) -> TakeRecords<Self>
    where
        Self: Sized,
    {
        TakeRecords::new(self, limit)
    }

    /// Call `func` on each record as it passes through.
    fn inspect_records<F: FnMut(&SequenceRecord)>(self, func: F) -> InspectRecords<Self, F>
    where
        Self: Sized,
    {
        InspectRecords::new(self, func)
    }
}
