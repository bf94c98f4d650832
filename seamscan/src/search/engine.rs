use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use super::aggregator::{displacements, gather_counts, gather_offsets};
use super::distributor::{broadcast_metadata, scatter_corpus};
use super::matcher::{MatchAlgorithm, PatternMatcher};
use crate::config::SearchConfig;
use crate::corpus::{ByteSource, Corpus, FileSource};
use crate::errors::{SearchError, SearchResult};
use crate::group::{Communicator, LocalGroup};
use crate::metrics::ScanMetrics;
use crate::partition::PartitionTable;
use crate::results::SearchOutput;

/// Where a worker is in a run. Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    MetadataBroadcast,
    CorpusScatter,
    LocalMatch,
    Barrier,
    CountGather,
    DisplacementCompute,
    DataGather,
    Report,
    Terminate,
    Aborted,
}

/// What only the coordinator holds after `Init`
struct RootInput<'p> {
    corpus: Arc<Corpus>,
    table: PartitionTable,
    pattern: &'p [u8],
}

/// One rank's pass through the kernel
struct Worker<'a, C: Communicator> {
    comm: &'a C,
    config: &'a SearchConfig,
    metrics: &'a ScanMetrics,
    phase: Phase,
}

impl<'a, C: Communicator> Worker<'a, C> {
    fn new(comm: &'a C, config: &'a SearchConfig, metrics: &'a ScanMetrics) -> Self {
        Self {
            comm,
            config,
            metrics,
            phase: Phase::Init,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "{:?} cannot follow {:?}", next, self.phase);
        trace!("Worker {}: {:?} -> {:?}", self.comm.rank(), self.phase, next);
        self.phase = next;
    }

    fn run<S: ByteSource + ?Sized>(
        mut self,
        source: &S,
        pattern: &[u8],
    ) -> SearchResult<Option<SearchOutput>> {
        let outcome = self.execute(source, pattern);
        if let Err(err) = &outcome {
            debug!(
                "Worker {} aborted during {:?}: {}",
                self.comm.rank(),
                self.phase,
                err
            );
            self.phase = Phase::Aborted;
        }
        outcome
    }

    fn execute<S: ByteSource + ?Sized>(
        &mut self,
        source: &S,
        pattern: &[u8],
    ) -> SearchResult<Option<SearchOutput>> {
        let root = if self.comm.is_root() {
            Some(self.prepare(source, pattern)?)
        } else {
            None
        };

        self.advance(Phase::MetadataBroadcast);
        let metadata = broadcast_metadata(
            self.comm,
            root.as_ref().map(|input| (&input.table, input.pattern)),
        )?;

        self.advance(Phase::CorpusScatter);
        let segment = scatter_corpus(
            self.comm,
            &metadata.table,
            root.as_ref().map(|input| &input.corpus),
        )?;
        let territory = metadata
            .table
            .get(self.comm.rank())
            .map_or(0, |partition| partition.territory);
        self.metrics.record_segment(
            segment.len() as u64,
            segment.len().saturating_sub(territory) as u64,
        );

        self.advance(Phase::LocalMatch);
        let matcher = PatternMatcher::new(metadata.pattern, self.config.algorithm)?;
        let matches = matcher.search_segment(&segment);
        self.metrics.record_scan(
            matcher.candidate_positions(segment.len()) as u64,
            matches.len() as u64,
        );
        drop(segment);

        self.advance(Phase::Barrier);
        self.comm.barrier()?;

        self.advance(Phase::CountGather);
        let counts = gather_counts(self.comm, &matches)?;

        self.advance(Phase::DisplacementCompute);
        let layout = counts.clone().map(displacements);

        self.advance(Phase::DataGather);
        let merged = gather_offsets(self.comm, matches, layout.as_ref())?;

        self.advance(Phase::Report);
        let output = match (merged, counts) {
            (Some(offsets), Some(counts)) => Some(SearchOutput::new(
                offsets,
                counts,
                metadata.table.corpus_len(),
                metadata.table.pattern_len(),
            )),
            _ => None,
        };

        self.advance(Phase::Terminate);
        Ok(output)
    }

    /// Coordinator-only: load the corpus, check the pattern, build the partition table
    fn prepare<'p, S: ByteSource + ?Sized>(
        &self,
        source: &S,
        pattern: &'p [u8],
    ) -> SearchResult<RootInput<'p>> {
        if pattern.is_empty() {
            return Err(SearchError::invalid_pattern("pattern must not be empty"));
        }
        let corpus = source.load()?;
        let corpus_len = self.config.eof_sentinel.searchable_len(corpus.len());
        let workers = NonZeroUsize::new(self.comm.size())
            .ok_or_else(|| SearchError::group("group has no workers"))?;

        let table = PartitionTable::compute(corpus_len, pattern.len(), workers)?;
        table.validate()?;

        Ok(RootInput {
            corpus: Arc::new(corpus),
            table,
            pattern,
        })
    }
}

/// Searches `source` for `pattern` with `config.worker_count` cooperating workers
pub fn search<S: ByteSource + ?Sized>(
    config: &SearchConfig,
    source: &S,
    pattern: &[u8],
) -> SearchResult<SearchOutput> {
    search_with_metrics(config, source, pattern, &ScanMetrics::new())
}

/// Like [`search`], recording distribution and matching counters into `metrics`
pub fn search_with_metrics<S: ByteSource + ?Sized>(
    config: &SearchConfig,
    source: &S,
    pattern: &[u8],
    metrics: &ScanMetrics,
) -> SearchResult<SearchOutput> {
    info!(
        "Starting search for a {} byte pattern in {} with {} workers ({})",
        pattern.len(),
        source.describe(),
        config.worker_count,
        config.algorithm
    );
    let started = Instant::now();

    let group = LocalGroup::new(config.worker_count);
    let output = group.run(|comm| Worker::new(comm, config, metrics).run(source, pattern))?;

    metrics.log_stats();
    info!(
        "Search complete. Found {} matches in {}",
        output.total_matches(),
        humantime::format_duration(started.elapsed())
    );
    Ok(output)
}

/// Searches the file at `path`
pub fn search_file(
    config: &SearchConfig,
    path: impl AsRef<Path>,
    pattern: &[u8],
) -> SearchResult<SearchOutput> {
    search(config, &FileSource::new(path.as_ref()), pattern)
}

/// Single-pass search over the whole corpus, the reference the partitioned run must equal
pub fn search_sequential(
    corpus: &[u8],
    pattern: &[u8],
    algorithm: MatchAlgorithm,
) -> SearchResult<Vec<usize>> {
    let matcher = PatternMatcher::new(pattern.to_vec(), algorithm)?;
    if pattern.len() > corpus.len() {
        return Err(SearchError::size(pattern.len(), corpus.len()));
    }
    Ok(matcher.find_matches(corpus))
}
