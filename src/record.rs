use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a record was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File(String),
    Object { bucket: String, key: String },
    Bytes,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Origin::*;
        match self {
            File(file) => write!(f, "file: \"{file}\""),
            Object { bucket, key } => write!(f, "object: \"gs://{bucket}/{key}\""),
            Bytes => write!(f, "bytes"),
        }
    }
}

/// One entry of a multi-FASTA protein file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    id: String,
    description: String,
    residues: Vec<u8>,
    origin: Arc<Origin>,
    idx: usize,
}

impl SequenceRecord {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        residues: impl Into<Vec<u8>>,
    ) -> Self {
        Self::with_origin(id, description, residues, Arc::new(Origin::Bytes), 0)
    }

    pub fn with_origin(
        id: impl Into<String>,
        description: impl Into<String>,
        residues: impl Into<Vec<u8>>,
        origin: Arc<Origin>,
        idx: usize,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            residues: residues.into(),
            origin,
            idx,
        }
    }

    /// Accession, the header text up to the first whitespace.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Free text following the accession in the header.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn residues(&self) -> &[u8] {
        &self.residues
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Zero-based index of the record in its source.
    pub fn idx(&self) -> usize {
        self.idx
    }
}

impl fmt::Display for SequenceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} residues, record {} in {})",
            self.id,
            self.residues.len(),
            self.idx,
            self.origin
        )
    }
}

/// A single motif hit. Offsets are zero-based and `end_offset` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub record_id: String,
    pub pattern_name: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub matched_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Match {
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}
