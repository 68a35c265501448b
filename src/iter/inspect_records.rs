use crate::iter::*;

pub struct InspectRecords<R: Records, F: FnMut(&SequenceRecord)> {
    records: R,
    func: F,
}

impl<R: Records, F: FnMut(&SequenceRecord)> InspectRecords<R, F> {
    pub fn new(records: R, func: F) -> Self {
        Self { records, func }
    }

    pub fn inner(&self) -> &R {
        &self.records
    }
}

impl<R: Records, F: FnMut(&SequenceRecord)> Records for InspectRecords<R, F> {
    fn next_record(&mut self) -> Result<Option<SequenceRecord>> {
        let record = self.records.next_record()?;
        if let Some(r) = &record {
            (self.func)(r);
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
