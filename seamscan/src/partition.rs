//! Splits a corpus into per-worker byte ranges.
//!
//! Each worker owns a *territory*: the positions at which it is responsible for
//! reporting a match. Territories are contiguous, ascending by rank and cover the
//! corpus exactly once. Every worker but the last also receives `pattern_len - 1`
//! overlap bytes past the end of its territory, so a match that starts in the
//! territory and runs into the next one is still fully inside the segment that
//! finds it. The next worker never reports that match: its first candidate position
//! is its own territory start.
use serde::Serialize;
use std::num::NonZeroUsize;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::group::VarLayout;

/// One worker's assigned byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Partition {
    /// Absolute corpus offset of the first byte in the segment
    pub offset: usize,
    /// Number of bytes in the segment, overlap included
    pub size: usize,
    /// Number of leading segment bytes this worker reports matches for
    pub territory: usize,
}

impl Partition {
    /// Absolute offset one past the last byte of the segment
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Per-rank partition assignment, indexed by worker rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionTable {
    corpus_len: usize,
    pattern_len: usize,
    partitions: Vec<Partition>,
}

impl PartitionTable {
    /// Computes the partition table for `worker_count` workers.
    ///
    /// The remainder of `corpus_len / worker_count` goes to the lowest ranks, one byte
    /// each. Offsets always advance by the previous territory. For entries whose
    /// size was not clamped this is the same as
    /// `offset[i] = offset[i-1] + size[i-1] - (pattern_len - 1)`.
    ///
    /// Segment sizes are clamped to the end of the corpus, which only matters when
    /// there are more workers than bytes to go around. Clamped entries break the
    /// relation above, and ranks with an empty territory get a zero-sized segment.
    pub fn compute(
        corpus_len: usize,
        pattern_len: usize,
        worker_count: NonZeroUsize,
    ) -> SearchResult<Self> {
        if pattern_len == 0 {
            return Err(SearchError::invalid_pattern("pattern must not be empty"));
        }
        if pattern_len > corpus_len {
            return Err(SearchError::size(pattern_len, corpus_len));
        }

        let workers = worker_count.get();
        let overlap = pattern_len - 1;
        let share = corpus_len / workers;
        let mut remainder = corpus_len % workers;

        let mut partitions = Vec::with_capacity(workers);
        let mut offset = 0;
        for rank in 0..workers {
            let mut territory = share;
            if remainder > 0 {
                territory += 1;
                remainder -= 1;
            }

            let mut size = territory;
            if rank < workers - 1 {
                size += overlap;
            }
            let size = size.min(corpus_len - offset);

            partitions.push(Partition {
                offset,
                size,
                territory,
            });
            offset += territory;
        }

        let table = Self {
            corpus_len,
            pattern_len,
            partitions,
        };
        debug!(
            "Partitioned {} bytes across {} workers with {} bytes of overlap",
            corpus_len, workers, overlap
        );
        Ok(table)
    }

    /// Re-checks every invariant the scatter relies on.
    pub fn validate(&self) -> SearchResult<()> {
        let Some(first) = self.partitions.first() else {
            return Err(SearchError::partition("table has no partitions"));
        };
        if first.offset != 0 {
            return Err(SearchError::partition(format!(
                "first partition starts at {} instead of 0",
                first.offset
            )));
        }

        let overlap = self.overlap();
        let last_rank = self.partitions.len() - 1;
        let mut expected_offset = 0;
        for (rank, partition) in self.partitions.iter().enumerate() {
            if partition.offset != expected_offset {
                return Err(SearchError::partition(format!(
                    "worker {} starts at {}, expected {}",
                    rank, partition.offset, expected_offset
                )));
            }
            if partition.end() > self.corpus_len {
                return Err(SearchError::partition(format!(
                    "worker {} ends at {}, past the corpus end {}",
                    rank,
                    partition.end(),
                    self.corpus_len
                )));
            }
            if partition.size < partition.territory {
                return Err(SearchError::partition(format!(
                    "worker {} segment of {} bytes is smaller than its territory of {}",
                    rank, partition.size, partition.territory
                )));
            }
            let wanted = if rank == last_rank {
                partition.territory
            } else {
                partition.territory + overlap
            };
            if partition.size != wanted.min(self.corpus_len - partition.offset) {
                return Err(SearchError::partition(format!(
                    "worker {} has {} bytes, expected {}",
                    rank, partition.size, wanted
                )));
            }
            expected_offset += partition.territory;
        }

        if expected_offset != self.corpus_len {
            return Err(SearchError::partition(format!(
                "territories cover {} bytes of a {} byte corpus",
                expected_offset, self.corpus_len
            )));
        }
        Ok(())
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus_len
    }

    pub fn pattern_len(&self) -> usize {
        self.pattern_len
    }

    /// Number of bytes appended to every segment but the last
    pub fn overlap(&self) -> usize {
        self.pattern_len.saturating_sub(1)
    }

    pub fn worker_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn get(&self, rank: usize) -> Option<&Partition> {
        self.partitions.get(rank)
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.partitions.iter().map(|p| p.size).collect()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.partitions.iter().map(|p| p.offset).collect()
    }

    /// Total bytes that travel in the scatter, overlap included
    pub fn scattered_bytes(&self) -> usize {
        self.partitions.iter().map(|p| p.size).sum()
    }

    /// Count/displacement pair that drives the corpus scatter
    pub fn scatter_layout(&self) -> VarLayout {
        VarLayout::new(self.sizes(), self.offsets())
    }
}
