//! Recency-based duplicate suppression for transcripts.
//!
//! Continuous capture re-records the same utterance across overlapping
//! windows. The deduplicator remembers the last few accepted transcripts
//! and flags candidates whose word sets overlap heavily with any of them.
//! This is a heuristic: false positives and negatives are acceptable.

use crate::defaults;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Fixed-capacity history of accepted transcripts.
#[derive(Debug)]
pub struct RecencyDeduplicator {
    history: Mutex<VecDeque<String>>,
    capacity: usize,
    threshold: f64,
}

impl Default for RecencyDeduplicator {
    fn default() -> Self {
        Self::new(defaults::HISTORY_CAPACITY, defaults::SIMILARITY_THRESHOLD)
    }
}

impl RecencyDeduplicator {
    /// Creates an empty history holding at most `capacity` entries.
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            threshold,
        }
    }

    /// Returns true if `candidate` should be suppressed.
    ///
    /// Trimmed candidates shorter than three characters are always
    /// suppressed. Otherwise the candidate is a duplicate when its Jaccard
    /// similarity with any history entry is strictly greater than the
    /// threshold. Read-only: callers record accepted text via [`record`].
    ///
    /// [`record`]: RecencyDeduplicator::record
    pub fn is_similar(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.chars().count() < defaults::MIN_DEDUP_CHARS {
            return true;
        }

        let candidate_words = word_set(candidate);
        self.lock().iter().any(|entry| {
            let entry_words = word_set(entry);
            set_similarity(&candidate_words, &entry_words) > self.threshold
        })
    }

    /// Appends an accepted transcript, evicting the oldest when full.
    pub fn record(&self, text: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut history = self.lock();
        while history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(text.to_string());
    }

    /// Forgets every remembered transcript. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut history = self.lock();
        let dropped = history.len();
        history.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of the history, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Token-set Jaccard similarity of two strings.
///
/// Both strings are lowercased and split on whitespace. Returns 0.0 when
/// either side has no words.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    set_similarity(&word_set(a), &word_set(b))
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn set_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}
