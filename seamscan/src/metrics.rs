use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Counters shared by every worker in a run
#[derive(Debug, Clone, Default)]
pub struct ScanMetrics {
    // Distribution
    bytes_scattered: Arc<AtomicU64>,
    overlap_bytes: Arc<AtomicU64>,

    // Matching
    candidate_positions: Arc<AtomicU64>,
    matches_found: Arc<AtomicU64>,
    workers_finished: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a segment received by one worker
    pub fn record_segment(&self, bytes: u64, overlap: u64) {
        let total = self.bytes_scattered.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.overlap_bytes.fetch_add(overlap, Ordering::Relaxed);
        debug!(
            "Segment received: {} bytes ({} overlap), total scattered: {} bytes",
            bytes, overlap, total
        );
    }

    /// Records one worker's finished scan
    pub fn record_scan(&self, candidates: u64, matches: u64) {
        self.candidate_positions
            .fetch_add(candidates, Ordering::Relaxed);
        self.matches_found.fetch_add(matches, Ordering::Relaxed);
        self.workers_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_scattered(&self) -> u64 {
        self.bytes_scattered.load(Ordering::Relaxed)
    }

    pub fn overlap_bytes(&self) -> u64 {
        self.overlap_bytes.load(Ordering::Relaxed)
    }

    pub fn candidate_positions(&self) -> u64 {
        self.candidate_positions.load(Ordering::Relaxed)
    }

    pub fn matches_found(&self) -> u64 {
        self.matches_found.load(Ordering::Relaxed)
    }

    pub fn workers_finished(&self) -> u64 {
        self.workers_finished.load(Ordering::Relaxed)
    }

    /// Gets a snapshot of every counter
    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            bytes_scattered: self.bytes_scattered(),
            overlap_bytes: self.overlap_bytes(),
            candidate_positions: self.candidate_positions(),
            matches_found: self.matches_found(),
            workers_finished: self.workers_finished(),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        debug!(
            "Scatter: {} bytes sent, {} of them overlap",
            stats.bytes_scattered, stats.overlap_bytes
        );
        debug!(
            "Matching: {} workers scanned {} candidate positions, {} matches",
            stats.workers_finished, stats.candidate_positions, stats.matches_found
        );
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_scattered: u64,
    pub overlap_bytes: u64,
    pub candidate_positions: u64,
    pub matches_found: u64,
    pub workers_finished: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_segment_tracking() {
        let metrics = ScanMetrics::new();
        metrics.record_segment(100, 2);
        metrics.record_segment(98, 0);

        let stats = metrics.get_stats();
        assert_eq!(stats.bytes_scattered, 198);
        assert_eq!(stats.overlap_bytes, 2);
    }

    #[test]
    fn test_scan_tracking() {
        let metrics = ScanMetrics::new();
        metrics.record_scan(50, 3);
        metrics.record_scan(40, 0);

        assert_eq!(metrics.candidate_positions(), 90);
        assert_eq!(metrics.matches_found(), 3);
        assert_eq!(metrics.workers_finished(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ScanMetrics::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || metrics.record_scan(10, 1))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.matches_found(), 4);
        assert_eq!(metrics.workers_finished(), 4);
    }
}
