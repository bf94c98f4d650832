//! The partition-and-collect search kernel.
//!
//! Every worker runs the same sequence:
//!
//! 1. The coordinator (rank 0) loads the corpus and computes the partition table
//! 2. [`distributor::broadcast_metadata`]: table and pattern go to every worker
//! 3. [`distributor::scatter_corpus`]: each worker receives its overlap-inclusive segment
//! 4. [`matcher::PatternMatcher`]: each worker scans its segment independently
//! 5. A barrier, then [`aggregator`]: counts are gathered, displacements computed, and
//!    the offsets gathered into one ascending list at the coordinator
//!
//! ```rust,ignore
//! let config = SearchConfig { worker_count: NonZeroUsize::new(4).unwrap(), ..Default::default() };
//! let output = search_file(&config, "corpus.txt", b"needle")?;
//! output.write_offsets(std::io::stdout().lock())?;
//! ```
//!
//! Any error on any worker aborts the whole group; there are no partial results.
pub mod aggregator;
pub mod distributor;
pub mod engine;
pub mod matcher;

pub use distributor::Segment;
pub use engine::{search, search_file, search_sequential, search_with_metrics, Phase};
pub use matcher::{MatchAlgorithm, PatternMatcher};
