//! Process-wide statistics registry, exposed as the synthetic `.camli_fs_stats` directory:
//! one file per counter, each returning its decimal value plus a newline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub const MUTFILE_OPEN: &str = "mutfile-open";
pub const MUTFILE_OPEN_ERROR: &str = "mutfile-open-error";
pub const MUTFILE_OPEN_RO: &str = "mutfile-open-ro";
pub const MUTFILE_OPEN_RW: &str = "mutfile-open-rw";
pub const ROFILE_OPEN: &str = "rofile-open";
pub const ROFILE_OPEN_ERROR: &str = "rofile-open-error";

const MINIMUM_COUNTERS: &[&str] = &[
    MUTFILE_OPEN,
    MUTFILE_OPEN_ERROR,
    MUTFILE_OPEN_RO,
    MUTFILE_OPEN_RW,
    ROFILE_OPEN,
    ROFILE_OPEN_ERROR,
];

/// A process-wide registry of named atomic counters. Increments are no-ops unless the
/// filesystem was started with stats tracking enabled (`Config::track_stats`).
#[derive(Debug)]
pub struct Stats {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    enabled: bool,
}

impl Stats {
    pub fn new(enabled: bool) -> Self {
        let mut counters = HashMap::new();
        for name in MINIMUM_COUNTERS {
            counters.insert(name.to_string(), Arc::new(AtomicU64::new(0)));
        }
        Stats {
            counters: Mutex::new(counters),
            enabled,
        }
    }

    /// Registers a new counter. Duplicate registration is a programming error.
    pub fn register(&self, name: &str) {
        let mut counters = self.counters.lock();
        if counters.contains_key(name) {
            panic!("duplicate stats counter registration: {name}");
        }
        counters.insert(name.to_string(), Arc::new(AtomicU64::new(0)));
    }

    pub fn incr(&self, name: &str) {
        if !self.enabled {
            return;
        }
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &str, n: u64) {
        if !self.enabled {
            return;
        }
        let counters = self.counters.lock();
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters
            .lock()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Names of every registered counter, for populating the synthetic stats directory.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.counters.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// The file contents for a counter: its decimal value followed by a newline.
    pub fn render(&self, name: &str) -> Option<Vec<u8>> {
        self.get(name).map(|v| format!("{v}\n").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_is_a_noop() {
        let stats = Stats::new(false);
        stats.incr(ROFILE_OPEN);
        assert_eq!(stats.get(ROFILE_OPEN), Some(0));
    }

    #[test]
    fn enabled_counts() {
        let stats = Stats::new(true);
        stats.incr(ROFILE_OPEN);
        stats.incr(ROFILE_OPEN);
        assert_eq!(stats.get(ROFILE_OPEN), Some(2));
        assert_eq!(stats.render(ROFILE_OPEN).unwrap(), b"2\n");
    }

    #[test]
    fn minimum_counters_present() {
        let stats = Stats::new(true);
        for name in MINIMUM_COUNTERS {
            assert!(stats.get(name).is_some(), "missing counter {name}");
        }
    }

    #[test]
    #[should_panic(expected = "duplicate stats counter registration")]
    fn duplicate_registration_panics() {
        let stats = Stats::new(true);
        stats.register(ROFILE_OPEN);
    }
}
