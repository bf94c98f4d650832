use std::sync::Arc;
use tracing::debug;

use crate::corpus::Corpus;
use crate::errors::{SearchError, SearchResult};
use crate::group::{Communicator, SharedBytes};
use crate::partition::PartitionTable;

/// A worker's private copy of its assigned byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    bytes: Vec<u8>,
    base_offset: usize,
}

impl Segment {
    pub fn new(bytes: Vec<u8>, base_offset: usize) -> Self {
        Self { bytes, base_offset }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Absolute corpus offset of the segment's first byte
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }
}

/// What every worker knows once the metadata broadcast is done
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub table: PartitionTable,
    pub pattern: Vec<u8>,
}

/// Broadcasts the partition table, then the pattern length, then the pattern bytes.
///
/// The root passes its table and pattern; everyone else passes `None`. Every worker
/// must hold the table before the scatter, since it sizes their receive buffers.
pub fn broadcast_metadata<C: Communicator>(
    comm: &C,
    root: Option<(&PartitionTable, &[u8])>,
) -> SearchResult<Metadata> {
    let table = comm.broadcast(root.map(|(table, _)| table.clone()))?;
    let pattern_len = comm.broadcast(root.map(|(_, pattern)| pattern.len()))?;
    let pattern = comm.broadcast(root.map(|(_, pattern)| pattern.to_vec()))?;

    if pattern.len() != pattern_len {
        return Err(SearchError::group(format!(
            "announced a {} byte pattern but received {} bytes",
            pattern_len,
            pattern.len()
        )));
    }
    if table.worker_count() != comm.size() {
        return Err(SearchError::partition(format!(
            "table has {} partitions for a group of {}",
            table.worker_count(),
            comm.size()
        )));
    }

    debug!(
        "Worker {} received a {} byte pattern and {} partitions",
        comm.rank(),
        pattern.len(),
        table.worker_count()
    );
    Ok(Metadata { table, pattern })
}

/// Scatters the corpus so each worker receives exactly its overlap-inclusive range.
///
/// Only the root passes the corpus. The corpus itself stays alive with the root;
/// each worker gets a copy of its own bytes.
pub fn scatter_corpus<C: Communicator>(
    comm: &C,
    table: &PartitionTable,
    corpus: Option<&Arc<Corpus>>,
) -> SearchResult<Segment> {
    let partition = table.get(comm.rank()).copied().ok_or_else(|| {
        SearchError::partition(format!("no partition for worker {}", comm.rank()))
    })?;

    let source = corpus.map(|corpus| {
        let bytes: SharedBytes = Arc::clone(corpus) as SharedBytes;
        (bytes, table.scatter_layout())
    });
    let bytes = comm.scatter_varcount(source, partition.size)?;

    debug!(
        "Worker {} holds bytes {}..{}",
        comm.rank(),
        partition.offset,
        partition.end()
    );
    Ok(Segment::new(bytes, partition.offset))
}
