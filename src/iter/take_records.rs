use crate::iter::*;

pub struct TakeRecords<R: Records> {
    records: R,
    limit: usize,
    taken: usize,
    truncated: Option<bool>,
}

impl<R: Records> TakeRecords<R> {
    pub fn new(records: R, limit: usize) -> Self {
        Self {
            records,
            limit,
            taken: 0,
            truncated: None,
        }
    }

    /// Whether the cap cut the stream short, as opposed to the source running dry.
    ///
    /// Only known once the stream has ended: the record after the cap is read and dropped to tell
    /// the two apart, so a source with exactly `limit` records is not reported as truncated.
    pub fn limit_reached(&self) -> bool {
        self.truncated == Some(true)
    }
}

impl<R: Records> Records for TakeRecords<R> {
    fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        if self.taken >= self.limit {
            if self.truncated.is_none() {
                // a read error past the cap still means there was more input
                self.truncated = Some(!matches!(self.records.next_record(), Ok(None)));
            }
            return Ok(None);
        }

        let record = self.records.next_record()?;
        if record.is_some() {
            self.taken += 1;
        } else {
            self.truncated = Some(false);
        }
        Ok(record)
    }

    fn finish(&mut self) -> Result<()> {
        self.records.finish()
    }

    fn skipped(&self) -> usize {
        self.records.skipped()
    }
}
