//! Two-phase result collection: a fixed-size count exchange, then a variable-length
//! gather of the offsets themselves, placed by the displacements the counts imply.
use tracing::debug;

use crate::errors::SearchResult;
use crate::group::{Communicator, VarLayout};
use crate::results::MatchSet;

/// Every worker sends its match count; the root receives one per rank, in rank order
pub fn gather_counts<C: Communicator>(
    comm: &C,
    matches: &MatchSet,
) -> SearchResult<Option<Vec<usize>>> {
    let counts = comm.gather(matches.len())?;
    if let Some(counts) = &counts {
        debug!("Gathered match counts: {:?}", counts);
    }
    Ok(counts)
}

/// Where each rank's offsets land in the merged buffer
pub fn displacements(counts: Vec<usize>) -> VarLayout {
    VarLayout::from_counts(counts)
}

/// Every worker sends its offsets; the root receives them concatenated in rank order.
///
/// Partitions ascend by rank and each worker's offsets ascend, so the merged buffer is
/// sorted without sorting it.
pub fn gather_offsets<C: Communicator>(
    comm: &C,
    matches: MatchSet,
    layout: Option<&VarLayout>,
) -> SearchResult<Option<Vec<usize>>> {
    let merged = comm.gather_varcount(matches.into_offsets(), layout)?;
    if let Some(offsets) = &merged {
        debug_assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::LocalGroup;
    use std::num::NonZeroUsize;

    #[test]
    fn test_displacements_are_cumulative() {
        let layout = displacements(vec![3, 0, 2]);
        assert_eq!(layout.displs(), &[0, 3, 3]);
    }

    #[test]
    fn test_two_phase_collect() {
        let group = LocalGroup::new(NonZeroUsize::new(3).unwrap());
        let merged = group
            .run(|comm| {
                let local: Vec<usize> = match comm.rank() {
                    0 => vec![0, 2],
                    1 => vec![],
                    _ => vec![7, 8, 9],
                };
                let matches = MatchSet::from(local);
                let counts = gather_counts(comm, &matches)?;
                let layout = counts.map(displacements);
                gather_offsets(comm, matches, layout.as_ref())
            })
            .unwrap();
        assert_eq!(merged, vec![0, 2, 7, 8, 9]);
    }
}
