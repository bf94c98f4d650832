/// Error types for seamscan.
///
/// Every phase of a search run returns a [`SearchResult`]. Because all workers take
/// part in the same sequence of collective operations, an error on one worker cannot
/// be handled locally: the worker aborts its group and every other participant sees
/// [`SearchError::Aborted`] from whatever collective it is blocked in. The caller of a
/// run gets the error that started the abort, never the echo.
///
/// ```rust,ignore
/// match seamscan::search_file(&config, path, b"needle") {
///     Ok(output) => // Print offsets,
///     Err(SearchError::Size { .. }) => // Pattern longer than the corpus,
///     Err(e) => // Everything else is fatal too
/// }
/// ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during a search run
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Usage: {0}")]
    Usage(String),
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Pattern is larger than the corpus: pattern is {pattern_len} bytes, corpus is {corpus_len} bytes")]
    Size {
        pattern_len: usize,
        corpus_len: usize,
    },
    #[error("Invalid partition table: {0}")]
    Partition(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Memory allocation failed for {what} ({bytes} bytes)")]
    Allocation { what: &'static str, bytes: usize },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Process group error: {0}")]
    Group(String),
    #[error("Aborted by worker {rank}: {reason}")]
    Aborted { rank: usize, reason: String },
}

impl SearchError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn size(pattern_len: usize, corpus_len: usize) -> Self {
        Self::Size {
            pattern_len,
            corpus_len,
        }
    }

    pub fn partition(msg: impl Into<String>) -> Self {
        Self::Partition(msg.into())
    }

    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn allocation(what: &'static str, bytes: usize) -> Self {
        Self::Allocation { what, bytes }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn group(msg: impl Into<String>) -> Self {
        Self::Group(msg.into())
    }

    pub fn aborted(rank: usize, reason: impl Into<String>) -> Self {
        Self::Aborted {
            rank,
            reason: reason.into(),
        }
    }

    /// Maps an I/O failure on `path` to the most specific variant
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// True for the error every bystander worker sees once a group has aborted
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Reserves exactly `len` elements, reporting failure as [`SearchError::Allocation`].
pub(crate) fn try_buffer<T>(what: &'static str, len: usize) -> SearchResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| SearchError::allocation(what, len.saturating_mul(std::mem::size_of::<T>())))?;
    Ok(buffer)
}
