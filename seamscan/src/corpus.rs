use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};

use crate::errors::{try_buffer, SearchError, SearchResult};

// Constants for corpus loading
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// How the final byte of a corpus is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EofSentinel {
    /// Every byte is searchable
    #[default]
    None,
    /// The last byte is a terminator and never part of a match
    TrailingByte,
}

impl EofSentinel {
    /// Number of leading bytes of a `len` byte corpus that are searched
    pub fn searchable_len(self, len: usize) -> usize {
        match self {
            Self::None => len,
            Self::TrailingByte => len.saturating_sub(1),
        }
    }
}

impl FromStr for EofSentinel {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "trailing-byte" => Ok(Self::TrailingByte),
            other => Err(SearchError::config_error(format!(
                "unknown eof sentinel '{}' (expected none or trailing-byte)",
                other
            ))),
        }
    }
}

impl fmt::Display for EofSentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::TrailingByte => write!(f, "trailing-byte"),
        }
    }
}

/// The full byte content of a search target, owned by the coordinator
pub enum Corpus {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Corpus {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes.as_slice(),
            Self::Mapped(map) => &map[..],
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl Deref for Corpus {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Corpus {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Corpus")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Provides the corpus bytes to the coordinator
pub trait ByteSource: Sync {
    /// Produces the complete content as one contiguous buffer
    fn load(&self) -> SearchResult<Corpus>;

    /// Human-readable name used in log messages
    fn describe(&self) -> String;
}

impl ByteSource for [u8] {
    fn load(&self) -> SearchResult<Corpus> {
        let mut bytes = try_buffer("corpus", self.len())?;
        bytes.extend_from_slice(self);
        Ok(Corpus::Owned(bytes))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.len())
    }
}

/// Reads the corpus from a file, choosing a strategy by size
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> SearchResult<File> {
        File::open(&self.path).map_err(|e| SearchError::from_io(e, &self.path))
    }

    fn read_small(&self, len: usize) -> SearchResult<Corpus> {
        trace!("Reading small corpus: {}", self.path.display());
        let mut file = self.open()?;
        let mut bytes = try_buffer("corpus", len)?;
        file.read_to_end(&mut bytes)
            .map_err(|e| SearchError::from_io(e, &self.path))?;
        Ok(Corpus::Owned(bytes))
    }

    fn read_buffered(&self, len: usize) -> SearchResult<Corpus> {
        trace!("Reading buffered corpus: {}", self.path.display());
        let file = self.open()?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = try_buffer("corpus", len)?;
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| SearchError::from_io(e, &self.path))?;
        Ok(Corpus::Owned(bytes))
    }

    fn map(&self) -> SearchResult<Corpus> {
        trace!("Memory mapping corpus: {}", self.path.display());
        let file = self.open()?;
        // SAFETY: the map is read-only and lives no longer than the run that reads it
        let map = unsafe { Mmap::map(&file) }.map_err(|e| SearchError::from_io(e, &self.path))?;
        Ok(Corpus::Mapped(map))
    }
}

impl ByteSource for FileSource {
    fn load(&self) -> SearchResult<Corpus> {
        let metadata =
            std::fs::metadata(&self.path).map_err(|e| SearchError::from_io(e, &self.path))?;
        if metadata.is_dir() {
            return Err(SearchError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", self.path.display()),
            )));
        }

        let size = metadata.len();
        let len =
            usize::try_from(size).map_err(|_| SearchError::allocation("corpus", usize::MAX))?;
        let corpus = if size < SMALL_FILE_THRESHOLD {
            self.read_small(len)?
        } else if size >= LARGE_FILE_THRESHOLD {
            self.map()?
        } else {
            self.read_buffered(len)?
        };

        debug!(
            "Loaded {} bytes from {} (mapped: {})",
            corpus.len(),
            self.path.display(),
            corpus.is_mapped()
        );
        Ok(corpus)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
