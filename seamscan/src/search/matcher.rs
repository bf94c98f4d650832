use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SearchError, SearchResult};
use crate::results::MatchSet;
use crate::search::distributor::Segment;

/// Which scan a worker runs over its segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchAlgorithm {
    /// Compare the pattern at every candidate position
    #[default]
    BruteForce,
    /// Knuth-Morris-Pratt: linear time using a failure function
    Kmp,
}

impl FromStr for MatchAlgorithm {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "brute-force" | "bruteforce" => Ok(Self::BruteForce),
            "kmp" => Ok(Self::Kmp),
            other => Err(SearchError::config_error(format!(
                "unknown algorithm '{}' (expected brute-force or kmp)",
                other
            ))),
        }
    }
}

impl fmt::Display for MatchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BruteForce => write!(f, "brute-force"),
            Self::Kmp => write!(f, "kmp"),
        }
    }
}

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    BruteForce,
    Kmp { failure: Vec<usize> },
}

/// Finds every occurrence of one literal pattern, overlapping occurrences included
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Vec<u8>,
    strategy: MatchStrategy,
}

impl PatternMatcher {
    /// Creates a new PatternMatcher; the pattern must not be empty
    pub fn new(pattern: Vec<u8>, algorithm: MatchAlgorithm) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Err(SearchError::invalid_pattern("pattern must not be empty"));
        }
        let strategy = match algorithm {
            MatchAlgorithm::BruteForce => MatchStrategy::BruteForce,
            MatchAlgorithm::Kmp => MatchStrategy::Kmp {
                failure: failure_function(&pattern),
            },
        };
        Ok(Self { pattern, strategy })
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn algorithm(&self) -> MatchAlgorithm {
        match self.strategy {
            MatchStrategy::BruteForce => MatchAlgorithm::BruteForce,
            MatchStrategy::Kmp { .. } => MatchAlgorithm::Kmp,
        }
    }

    /// Number of positions a match could start at in `haystack_len` bytes
    pub fn candidate_positions(&self, haystack_len: usize) -> usize {
        (haystack_len + 1).saturating_sub(self.pattern.len())
    }

    /// Finds all match start positions in the given bytes, ascending
    pub fn find_matches(&self, haystack: &[u8]) -> Vec<usize> {
        match &self.strategy {
            MatchStrategy::BruteForce => self.brute_force(haystack),
            MatchStrategy::Kmp { failure } => self.kmp(haystack, failure),
        }
    }

    /// Scans a segment and reports matches as absolute corpus offsets
    pub fn search_segment(&self, segment: &Segment) -> MatchSet {
        self.find_matches(segment.bytes())
            .into_iter()
            .map(|local| local + segment.base_offset())
            .collect::<Vec<_>>()
            .into()
    }

    fn brute_force(&self, haystack: &[u8]) -> Vec<usize> {
        let m = self.pattern.len();
        let mut matches = Vec::new();
        for i in 0..self.candidate_positions(haystack.len()) {
            let mut j = 0;
            while j < m && haystack[i + j] == self.pattern[j] {
                j += 1;
            }
            if j == m {
                matches.push(i);
            }
        }
        matches
    }

    fn kmp(&self, haystack: &[u8], failure: &[usize]) -> Vec<usize> {
        let m = self.pattern.len();
        let mut matches = Vec::new();
        let mut matched = 0;
        for (i, &byte) in haystack.iter().enumerate() {
            while matched > 0 && byte != self.pattern[matched] {
                matched = failure[matched - 1];
            }
            if byte == self.pattern[matched] {
                matched += 1;
            }
            if matched == m {
                matches.push(i + 1 - m);
                matched = failure[m - 1];
            }
        }
        matches
    }
}

/// `failure[i]` is the length of the longest proper prefix of `pattern[..=i]` that is
/// also a suffix of it
fn failure_function(pattern: &[u8]) -> Vec<usize> {
    let mut failure = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = failure[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}
