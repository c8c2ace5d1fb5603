// src/watch/debouncer.rs

//! Per-path debouncing of file change events.
//!
//! Editors and build tools emit bursts of events for one logical save
//! (write + rename + metadata). Collapsing a burst into a single trigger
//! keeps a stage from re-running once per event.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Records change timestamps per path and releases paths that have been
/// stable for the configured window.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashMap<PathBuf, Instant>,
    window: Duration,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            window: Duration::from_millis(window_ms),
        }
    }

    /// Record a change event, resetting the timer for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Take all paths that have been stable for the debounce window,
    /// removing them from pending.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.window {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn nothing_ready_inside_the_window() {
        let mut debouncer = Debouncer::new(50);
        debouncer.record(PathBuf::from("app/a.style"));

        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.has_pending());

        sleep(Duration::from_millis(60));

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![PathBuf::from("app/a.style")]);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn burst_for_one_path_collapses_to_one_release() {
        let mut debouncer = Debouncer::new(50);
        for _ in 0..5 {
            debouncer.record(PathBuf::from("app/a.style"));
        }

        sleep(Duration::from_millis(60));
        assert_eq!(debouncer.take_ready().len(), 1);
    }

    #[test]
    fn a_new_change_resets_the_timer() {
        let mut debouncer = Debouncer::new(50);
        debouncer.record(PathBuf::from("app/a.style"));

        sleep(Duration::from_millis(30));
        debouncer.record(PathBuf::from("app/a.style"));

        sleep(Duration::from_millis(30));
        assert!(debouncer.take_ready().is_empty());

        sleep(Duration::from_millis(30));
        assert_eq!(debouncer.take_ready().len(), 1);
    }
}
