/// Result types for a search run.
///
/// A worker's findings travel as a [`MatchSet`] of absolute offsets. The coordinator
/// gathers every set, in rank order, into a single [`SearchOutput`]. Because the
/// partitions are ascending by rank and each set is ascending, the concatenation is
/// already sorted.
use serde::Serialize;
use std::io::{self, Write};

use crate::errors::{SearchError, SearchResult};

/// A worker's matches, as ascending absolute corpus offsets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    offsets: Vec<usize>,
}

impl MatchSet {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn into_offsets(self) -> Vec<usize> {
        self.offsets
    }
}

impl From<Vec<usize>> for MatchSet {
    fn from(offsets: Vec<usize>) -> Self {
        Self { offsets }
    }
}

/// The merged result of a run, produced once by the coordinator
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutput {
    /// Absolute match offsets, strictly ascending
    pub offsets: Vec<usize>,
    /// Number of matches each worker contributed, by rank
    pub worker_counts: Vec<usize>,
    /// Bytes that were searched
    pub corpus_len: usize,
    /// Length of the pattern in bytes
    pub pattern_len: usize,
}

impl SearchOutput {
    pub fn new(
        offsets: Vec<usize>,
        worker_counts: Vec<usize>,
        corpus_len: usize,
        pattern_len: usize,
    ) -> Self {
        Self {
            offsets,
            worker_counts,
            corpus_len,
            pattern_len,
        }
    }

    pub fn total_matches(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_counts.len()
    }

    /// True when every offset is larger than the one before it
    pub fn is_strictly_ascending(&self) -> bool {
        self.offsets.windows(2).all(|pair| pair[0] < pair[1])
    }

    /// Writes one offset per line
    pub fn write_offsets<W: Write>(&self, mut out: W) -> io::Result<()> {
        for offset in &self.offsets {
            writeln!(out, "{}", offset)?;
        }
        out.flush()
    }

    /// Pretty-printed JSON form of the whole result
    pub fn to_json(&self) -> SearchResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SearchError::IoError(io::Error::new(io::ErrorKind::Other, e)))
    }
}
