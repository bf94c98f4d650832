/// Fixed-size worker groups and the collective operations they coordinate through.
///
/// A search run is single-program, multiple-data: every worker executes the same kernel
/// and the only cross-worker interaction is a collective call (broadcast, scatter,
/// gather, barrier). A collective completes only once every member of the group has
/// entered it, so all workers must issue the same collectives in the same order.
///
/// ```rust,ignore
/// let table = comm.broadcast(comm.is_root().then(|| table))?;
/// let segment = comm.scatter_varcount(root_corpus, table.sizes()[comm.rank()])?;
/// let counts = comm.gather(local_matches.len())?;
/// ```
///
/// There is no cancellation. A worker that hits an error calls [`Communicator::abort`];
/// that wakes every participant blocked in a collective, and all of them return
/// [`SearchError::Aborted`](crate::SearchError::Aborted) from then on.
pub mod local;

use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

pub use local::{LocalComm, LocalGroup};

/// Rank of the coordinator
pub const ROOT: usize = 0;

/// Bytes the root hands to a scatter; shared so the corpus is never copied whole
pub type SharedBytes = Arc<dyn AsRef<[u8]> + Send + Sync>;

/// Per-rank element counts and buffer displacements for variable-length collectives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarLayout {
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl VarLayout {
    pub fn new(counts: Vec<usize>, displs: Vec<usize>) -> Self {
        Self { counts, displs }
    }

    /// Packs `counts` back to back: `displs[0] = 0`, `displs[i] = displs[i-1] + counts[i-1]`
    pub fn from_counts(counts: Vec<usize>) -> Self {
        let displs = counts
            .iter()
            .scan(0usize, |next, &count| {
                let displ = *next;
                *next += count;
                Some(displ)
            })
            .collect();
        Self { counts, displs }
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn displs(&self) -> &[usize] {
        &self.displs
    }

    /// Sum of every rank's count
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Checks that the layout has one entry per rank and stays within `len` elements
    pub fn check(&self, ranks: usize, len: usize) -> SearchResult<()> {
        if self.counts.len() != ranks || self.displs.len() != ranks {
            return Err(SearchError::group(format!(
                "layout describes {} counts and {} displacements for {} ranks",
                self.counts.len(),
                self.displs.len(),
                ranks
            )));
        }
        for (rank, (&count, &displ)) in self.counts.iter().zip(&self.displs).enumerate() {
            if displ.checked_add(count).map_or(true, |end| end > len) {
                return Err(SearchError::group(format!(
                    "block for rank {} ({} elements at {}) exceeds a buffer of {}",
                    rank, count, displ, len
                )));
            }
        }
        Ok(())
    }
}

/// Collective operations over a fixed group of workers.
///
/// Arguments that only matter at the root are `Option`s: the root passes `Some`,
/// everyone else `None`. Results that only the root receives come back the same way.
pub trait Communicator {
    /// This worker's rank, `0..size()`
    fn rank(&self) -> usize;

    /// Number of workers in the group
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }

    /// Returns once every worker has reached the barrier
    fn barrier(&self) -> SearchResult<()>;

    /// Delivers the root's value to every worker
    fn broadcast<T>(&self, value: Option<T>) -> SearchResult<T>
    where
        T: Clone + Send + Sync + 'static;

    /// Hands each rank `counts[rank]` bytes starting at `displs[rank]` of the root's
    /// buffer. Every rank states how many bytes it expects to receive.
    fn scatter_varcount(
        &self,
        source: Option<(SharedBytes, VarLayout)>,
        recv_count: usize,
    ) -> SearchResult<Vec<u8>>;

    /// Collects one value per rank, in rank order, at the root
    fn gather<T>(&self, value: T) -> SearchResult<Option<Vec<T>>>
    where
        T: Clone + Send + Sync + 'static;

    /// Collects a variable number of elements per rank at the root, placing rank `i`'s
    /// block at `layout.displs()[i]` of the receive buffer
    fn gather_varcount<T>(
        &self,
        values: Vec<T>,
        layout: Option<&VarLayout>,
    ) -> SearchResult<Option<Vec<T>>>
    where
        T: Copy + Default + Send + Sync + 'static;

    /// Tears down the whole group; every current and future collective fails
    fn abort(&self, error: &SearchError);
}
