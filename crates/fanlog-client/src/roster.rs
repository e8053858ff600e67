//! Target stream roster.
//!
//! The writer is configured with N equivalent streams. The roster shuffles
//! them once at construction, so a fleet of writers built from the same
//! config spreads first-choice load instead of hammering the first name in
//! the list. Each dispatched record set claims a starting index from a
//! shared round-robin counter and walks the roster modulo N from there.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;

/// Shuffled list of target stream names.
#[derive(Debug)]
pub struct StreamRoster {
    streams: Vec<String>,
    next_start: AtomicUsize,
}

impl StreamRoster {
    /// Build a roster from a non-empty stream list. The order is permuted
    /// once, here; it never changes afterwards.
    pub fn new(mut streams: Vec<String>) -> Self {
        streams.shuffle(&mut rand::thread_rng());
        Self {
            streams,
            next_start: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stream name at roster index `idx`. Callers keep `idx` in range by
    /// advancing modulo `len()`.
    pub fn get(&self, idx: usize) -> &str {
        &self.streams[idx]
    }

    /// Claim the starting index for a new record set's dispatch.
    pub fn next_start(&self) -> usize {
        self.next_start.fetch_add(1, Ordering::Relaxed) % self.streams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("stream-{i}")).collect()
    }

    #[test]
    fn test_roster_is_a_permutation() {
        let input = names(16);
        let roster = StreamRoster::new(input.clone());
        let original: BTreeSet<_> = input.into_iter().collect();
        let shuffled: BTreeSet<_> = (0..roster.len()).map(|i| roster.get(i).to_string()).collect();
        assert_eq!(original, shuffled);
    }

    #[test]
    fn test_len() {
        assert_eq!(StreamRoster::new(names(3)).len(), 3);
        assert!(!StreamRoster::new(names(3)).is_empty());
    }

    #[test]
    fn test_next_start_cycles_modulo_n() {
        let roster = StreamRoster::new(names(3));
        let starts: Vec<usize> = (0..7).map(|_| roster.next_start()).collect();
        assert_eq!(starts, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_single_stream_roster() {
        let roster = StreamRoster::new(vec!["only".to_string()]);
        assert_eq!(roster.get(0), "only");
        assert_eq!(roster.next_start(), 0);
        assert_eq!(roster.next_start(), 0);
    }
}
