pub mod config;
pub mod corpus;
pub mod errors;
pub mod group;
pub mod metrics;
pub mod partition;
pub mod results;
pub mod search;

pub use config::{CliOverrides, SearchConfig};
pub use corpus::{ByteSource, Corpus, EofSentinel, FileSource};
pub use errors::{SearchError, SearchResult};
pub use partition::{Partition, PartitionTable};
pub use results::{MatchSet, SearchOutput};
pub use search::{search, search_file, search_sequential, MatchAlgorithm};
