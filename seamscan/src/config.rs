use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::corpus::EofSentinel;
use crate::search::matcher::MatchAlgorithm;

/// Configuration for a search run.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag (must exist)
/// 2. Local `.seamscan.yaml` in the current directory
/// 3. Global `$HOME/.config/seamscan/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Number of cooperating workers (default: CPU cores)
/// worker_count: 4
///
/// # Matching algorithm: brute-force or kmp
/// algorithm: brute-force
///
/// # Treat the last byte of the file as a terminator: none or trailing-byte
/// eof_sentinel: none
///
/// # Print only the match count
/// stats_only: false
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "warn"
/// ```
///
/// Command-line arguments take precedence over config file values; see
/// [`SearchConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of workers in the group, fixed for the whole run
    #[serde(default = "default_worker_count")]
    pub worker_count: NonZeroUsize,

    /// Scan each worker runs over its segment
    #[serde(default)]
    pub algorithm: MatchAlgorithm,

    /// Whether the final byte of the corpus is searchable
    #[serde(default)]
    pub eof_sentinel: EofSentinel,

    /// Whether to only show the match count instead of offsets
    #[serde(default)]
    pub stats_only: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            algorithm: MatchAlgorithm::default(),
            eof_sentinel: EofSentinel::default(),
            stats_only: false,
            log_level: default_log_level(),
        }
    }
}

/// Values given on the command line; `None` leaves the file value alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub worker_count: Option<NonZeroUsize>,
    pub algorithm: Option<MatchAlgorithm>,
    pub eof_sentinel: Option<EofSentinel>,
    pub stats_only: bool,
    pub log_level: Option<String>,
}

impl SearchConfig {
    /// Loads configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Default config locations, lowest precedence first
        let defaults = [
            dirs::config_dir().map(|p| p.join("seamscan/config.yaml")),
            Some(PathBuf::from(".seamscan.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly named file has to be there
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(worker_count) = cli.worker_count {
            self.worker_count = worker_count;
        }
        if let Some(algorithm) = cli.algorithm {
            self.algorithm = algorithm;
        }
        if let Some(eof_sentinel) = cli.eof_sentinel {
            self.eof_sentinel = eof_sentinel;
        }
        if cli.stats_only {
            self.stats_only = true;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        self
    }
}
