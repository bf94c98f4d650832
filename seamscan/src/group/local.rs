//! In-process worker group: one OS thread per rank, collectives as rendezvous rounds.
//!
//! Every collective is a round. Each rank deposits its contribution, the last rank to
//! arrive publishes the full set and bumps the round generation, and everyone reads
//! what they need out of the published set. A rank cannot start the next round before
//! it has read the current one, so a published set is never replaced under a reader.
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use tracing::{debug, trace};

use super::{Communicator, SharedBytes, VarLayout, ROOT};
use crate::errors::{try_buffer, SearchError, SearchResult};

type Payload = Box<dyn Any + Send + Sync>;

#[derive(Debug, Clone)]
struct AbortSignal {
    rank: usize,
    reason: String,
}

struct Round {
    arrived: usize,
    generation: u64,
    deposits: Vec<Option<Payload>>,
    published: Arc<Vec<Payload>>,
    abort: Option<AbortSignal>,
}

struct Shared {
    size: usize,
    round: Mutex<Round>,
    turnstile: Condvar,
}

fn empty_slots(size: usize) -> Vec<Option<Payload>> {
    (0..size).map(|_| None).collect()
}

impl Shared {
    fn new(size: usize) -> Self {
        Self {
            size,
            round: Mutex::new(Round {
                arrived: 0,
                generation: 0,
                deposits: empty_slots(size),
                published: Arc::new(Vec::new()),
                abort: None,
            }),
            turnstile: Condvar::new(),
        }
    }

    fn lock(&self) -> SearchResult<MutexGuard<'_, Round>> {
        self.round
            .lock()
            .map_err(|_| SearchError::group("group state poisoned"))
    }

    fn abort(&self, rank: usize, reason: String) {
        // A poisoned lock must not stop the abort from reaching the other workers
        let mut round = self
            .round
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if round.abort.is_none() {
            debug!("Worker {} aborted the group: {}", rank, reason);
            round.abort = Some(AbortSignal { rank, reason });
        }
        drop(round);
        self.turnstile.notify_all();
    }

    fn abort_origin(&self) -> Option<usize> {
        self.lock()
            .ok()
            .and_then(|round| round.abort.as_ref().map(|signal| signal.rank))
    }

    fn exchange(&self, rank: usize, payload: Payload) -> SearchResult<Arc<Vec<Payload>>> {
        let mut round = self.lock()?;
        if let Some(signal) = &round.abort {
            return Err(SearchError::aborted(signal.rank, signal.reason.clone()));
        }

        round.deposits[rank] = Some(payload);
        round.arrived += 1;
        if round.arrived == self.size {
            let deposits = std::mem::replace(&mut round.deposits, empty_slots(self.size));
            let published: Vec<Payload> = deposits.into_iter().flatten().collect();
            if published.len() != self.size {
                return Err(SearchError::group(format!(
                    "round completed with {} of {} contributions",
                    published.len(),
                    self.size
                )));
            }
            round.published = Arc::new(published);
            round.arrived = 0;
            round.generation = round.generation.wrapping_add(1);
            trace!("Round {} complete", round.generation);
            let published = Arc::clone(&round.published);
            drop(round);
            self.turnstile.notify_all();
            return Ok(published);
        }

        let generation = round.generation;
        let round = self
            .turnstile
            .wait_while(round, |r| r.generation == generation && r.abort.is_none())
            .map_err(|_| SearchError::group("group state poisoned"))?;
        if round.generation != generation {
            return Ok(Arc::clone(&round.published));
        }
        match &round.abort {
            Some(signal) => Err(SearchError::aborted(signal.rank, signal.reason.clone())),
            None => Err(SearchError::group("woken without a completed round")),
        }
    }
}

fn contribution<T: 'static>(payloads: &[Payload], rank: usize) -> SearchResult<&T> {
    payloads
        .get(rank)
        .and_then(|boxed| {
            let payload: &(dyn Any + Send + Sync) = &**boxed;
            payload.downcast_ref::<T>()
        })
        .ok_or_else(|| {
            SearchError::group(format!(
                "rank {} contributed to a different collective",
                rank
            ))
        })
}

/// One worker's handle on a [`LocalGroup`]
pub struct LocalComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalComm {
    fn exchange<T: Any + Send + Sync>(&self, value: T) -> SearchResult<Arc<Vec<Payload>>> {
        self.shared.exchange(self.rank, Box::new(value))
    }

    fn fail(&self, error: SearchError) -> SearchError {
        self.abort(&error);
        error
    }

    /// Runs the worker body and aborts the group on any error it did not inherit
    fn drive<F, R>(&self, worker: &F) -> SearchResult<Option<R>>
    where
        F: Fn(&LocalComm) -> SearchResult<Option<R>>,
    {
        let _guard = AbortOnPanic(self);
        let outcome = worker(self);
        if let Err(err) = &outcome {
            if !err.is_abort() {
                self.abort(err);
            }
        }
        outcome
    }
}

struct AbortOnPanic<'a>(&'a LocalComm);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0
                .shared
                .abort(self.0.rank, format!("worker {} panicked", self.0.rank));
        }
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> SearchResult<()> {
        self.exchange(())?;
        Ok(())
    }

    fn broadcast<T>(&self, value: Option<T>) -> SearchResult<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let payloads = self.exchange(value)?;
        contribution::<Option<T>>(&payloads, ROOT)?
            .clone()
            .ok_or_else(|| SearchError::group("root did not supply a value to broadcast"))
    }

    fn scatter_varcount(
        &self,
        source: Option<(SharedBytes, VarLayout)>,
        recv_count: usize,
    ) -> SearchResult<Vec<u8>> {
        if let Some((bytes, layout)) = &source {
            let data: &[u8] = (**bytes).as_ref();
            layout
                .check(self.size(), data.len())
                .map_err(|e| self.fail(e))?;
        }

        let payloads = self.exchange(source)?;
        let (bytes, layout) = contribution::<Option<(SharedBytes, VarLayout)>>(&payloads, ROOT)?
            .as_ref()
            .ok_or_else(|| SearchError::group("root did not supply scatter data"))?;

        let count = layout.counts()[self.rank];
        let displ = layout.displs()[self.rank];
        if count != recv_count {
            return Err(SearchError::group(format!(
                "worker {} expected {} bytes but was sent {}",
                self.rank, recv_count, count
            )));
        }

        let data: &[u8] = (**bytes).as_ref();
        let block = data
            .get(displ..displ + count)
            .ok_or_else(|| SearchError::group("scatter block out of bounds"))?;
        let mut received = try_buffer("segment", count)?;
        received.extend_from_slice(block);
        Ok(received)
    }

    fn gather<T>(&self, value: T) -> SearchResult<Option<Vec<T>>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let payloads = self.exchange(value)?;
        if !self.is_root() {
            return Ok(None);
        }
        let gathered = (0..self.size())
            .map(|rank| contribution::<T>(&payloads, rank).cloned())
            .collect::<SearchResult<Vec<T>>>()?;
        Ok(Some(gathered))
    }

    fn gather_varcount<T>(
        &self,
        values: Vec<T>,
        layout: Option<&VarLayout>,
    ) -> SearchResult<Option<Vec<T>>>
    where
        T: Copy + Default + Send + Sync + 'static,
    {
        let layout = match (self.is_root(), layout) {
            (true, Some(layout)) => {
                layout
                    .check(self.size(), layout.total())
                    .map_err(|e| self.fail(e))?;
                Some(layout)
            }
            (true, None) => {
                return Err(self.fail(SearchError::group("root gathered without a layout")))
            }
            (false, _) => None,
        };

        let payloads = self.exchange(values)?;
        let Some(layout) = layout else {
            return Ok(None);
        };

        let total = layout.total();
        let mut buffer = try_buffer("result buffer", total)?;
        buffer.resize(total, T::default());
        for rank in 0..self.size() {
            let block = contribution::<Vec<T>>(&payloads, rank)?;
            let count = layout.counts()[rank];
            let displ = layout.displs()[rank];
            if block.len() != count {
                return Err(SearchError::group(format!(
                    "rank {} sent {} elements, layout expects {}",
                    rank,
                    block.len(),
                    count
                )));
            }
            buffer[displ..displ + count].copy_from_slice(block);
        }
        Ok(Some(buffer))
    }

    fn abort(&self, error: &SearchError) {
        self.shared.abort(self.rank, error.to_string());
    }
}

/// Fixed-size group of workers backed by scoped threads.
///
/// The group size is set at construction; [`LocalGroup::run`] starts exactly that many
/// threads, runs the same worker body on each and joins them all before returning.
#[derive(Debug, Clone, Copy)]
pub struct LocalGroup {
    size: NonZeroUsize,
}

impl LocalGroup {
    pub fn new(size: NonZeroUsize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// Runs `worker` on every rank and returns the coordinator's value.
    ///
    /// Non-root workers return `Ok(None)`. If any worker fails, the error that
    /// triggered the abort is returned rather than the `Aborted` the others saw.
    pub fn run<F, R>(&self, worker: F) -> SearchResult<R>
    where
        F: Fn(&LocalComm) -> SearchResult<Option<R>> + Sync,
        R: Send,
    {
        let size = self.size.get();
        let shared = Arc::new(Shared::new(size));
        let worker = &worker;

        let outcomes: Vec<(usize, SearchResult<Option<R>>)> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(size);
            let mut outcomes = Vec::with_capacity(size);
            for rank in 0..size {
                let comm = LocalComm {
                    rank,
                    shared: Arc::clone(&shared),
                };
                let spawned = thread::Builder::new()
                    .name(format!("seamscan-worker-{}", rank))
                    .spawn_scoped(scope, move || comm.drive(worker));
                match spawned {
                    Ok(handle) => handles.push((rank, handle)),
                    Err(e) => {
                        let err = SearchError::IoError(e);
                        shared.abort(rank, err.to_string());
                        outcomes.push((rank, Err(err)));
                        break;
                    }
                }
            }
            for (rank, handle) in handles {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(SearchError::group(format!("worker {} panicked", rank)))
                });
                outcomes.push((rank, outcome));
            }
            outcomes
        });

        let origin = shared.abort_origin();
        let mut root_value = None;
        let mut causes = Vec::new();
        let mut echo = None;
        for (rank, outcome) in outcomes {
            match outcome {
                Ok(Some(value)) if rank == ROOT => root_value = Some(value),
                Ok(_) => {}
                Err(e) if e.is_abort() => {
                    echo.get_or_insert(e);
                }
                Err(e) => causes.push((rank, e)),
            }
        }

        if !causes.is_empty() {
            let pick = causes
                .iter()
                .position(|(rank, _)| Some(*rank) == origin)
                .unwrap_or(0);
            return Err(causes.swap_remove(pick).1);
        }
        if let Some(e) = echo {
            return Err(e);
        }
        root_value.ok_or_else(|| SearchError::group("coordinator finished without a result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn group(n: usize) -> LocalGroup {
        LocalGroup::new(NonZeroUsize::new(n).unwrap())
    }

    #[test]
    fn test_broadcast_reaches_every_rank() {
        let seen = group(4)
            .run(|comm| {
                let value = comm.broadcast(comm.is_root().then_some(42u64))?;
                comm.gather(value)
            })
            .unwrap();
        assert_eq!(seen, vec![42, 42, 42, 42]);
    }

    #[test]
    fn test_gather_is_rank_ordered() {
        let ranks = group(5).run(|comm| comm.gather(comm.rank())).unwrap();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_barrier_waits_for_everyone() {
        let arrived = AtomicUsize::new(0);
        let observed = group(6)
            .run(|comm| {
                arrived.fetch_add(1, Ordering::SeqCst);
                comm.barrier()?;
                comm.gather(arrived.load(Ordering::SeqCst))
            })
            .unwrap();
        assert!(observed.iter().all(|&n| n == 6));
    }

    #[test]
    fn test_scatter_hands_out_overlapping_blocks() {
        let data: SharedBytes = Arc::new(b"abcdefgh".to_vec());
        let layout = VarLayout::new(vec![4, 4, 2], vec![0, 3, 6]);
        let blocks = group(3)
            .run(|comm| {
                let source = comm
                    .is_root()
                    .then(|| (Arc::clone(&data), layout.clone()));
                let block = comm.scatter_varcount(source, layout.counts()[comm.rank()])?;
                comm.gather(block)
            })
            .unwrap();
        assert_eq!(
            blocks,
            vec![b"abcd".to_vec(), b"defg".to_vec(), b"gh".to_vec()]
        );
    }

    #[test]
    fn test_scatter_rejects_wrong_receive_count() {
        let data: SharedBytes = Arc::new(b"abcdef".to_vec());
        let layout = VarLayout::new(vec![3, 3], vec![0, 3]);
        let err = group(2)
            .run(|comm| {
                let source = comm
                    .is_root()
                    .then(|| (Arc::clone(&data), layout.clone()));
                let block = comm.scatter_varcount(source, 2)?;
                comm.gather(block)
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::Group(_)));
    }

    #[test]
    fn test_gather_varcount_places_blocks_by_displacement() {
        let gathered = group(4)
            .run(|comm| {
                let values: Vec<u64> = vec![comm.rank() as u64; comm.rank()];
                let counts = comm.gather(values.len())?;
                let layout = counts.map(VarLayout::from_counts);
                comm.gather_varcount(values, layout.as_ref())
            })
            .unwrap();
        assert_eq!(gathered, vec![1, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn test_gather_varcount_rejects_gapped_layout() {
        let err = group(2)
            .run(|comm| {
                let layout = VarLayout::new(vec![1, 1], vec![0, 2]);
                let layout = comm.is_root().then_some(&layout);
                comm.gather_varcount(vec![comm.rank() as u64], layout)
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::Group(_)));
    }

    #[test]
    fn test_error_on_one_rank_aborts_the_rest() {
        let err = group(4)
            .run(|comm| {
                if comm.rank() == 2 {
                    return Err(SearchError::size(5, 4));
                }
                let value = comm.broadcast(comm.is_root().then_some(1u8))?;
                comm.gather(value)
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::Size { .. }));
    }

    #[test]
    fn test_root_failure_releases_blocked_workers() {
        let aborted = AtomicUsize::new(0);
        let err = group(3)
            .run(|comm| {
                if comm.is_root() {
                    return Err(SearchError::file_not_found("missing.txt"));
                }
                match comm.broadcast::<u32>(None) {
                    Err(e) if e.is_abort() => {
                        aborted.fetch_add(1, Ordering::SeqCst);
                        Err(e)
                    }
                    other => other.map(|_| None::<()>),
                }
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::FileNotFound(_)));
        assert_eq!(aborted.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mismatched_collectives_are_reported() {
        let err = group(2)
            .run(|comm| {
                if comm.is_root() {
                    comm.gather(1u64)
                } else {
                    comm.gather(1u32).map(|_| None)
                }
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::Group(_)));
    }

    #[test]
    fn test_panicking_worker_aborts_group() {
        let err = group(3)
            .run(|comm| {
                if comm.rank() == 1 {
                    panic!("worker fell over");
                }
                comm.barrier()?;
                Ok(Some(()))
            })
            .unwrap_err();
        assert!(matches!(err, SearchError::Group(msg) if msg.contains("panicked")));
    }

    #[test]
    fn test_single_worker_group() {
        let value = group(1)
            .run(|comm| {
                let v = comm.broadcast(Some("solo".to_string()))?;
                comm.barrier()?;
                Ok(Some(v))
            })
            .unwrap();
        assert_eq!(value, "solo");
    }
}
