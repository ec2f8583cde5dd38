// src/output/aggregator.rs

use std::sync::{Arc, Mutex, MutexGuard};

use super::OutputSink;

/// Thread-safe, append-only accumulator of the fragments of one execution.
///
/// Clones share the same buffer, so a sink closure living on the automaton's
/// thread and the bridge on the foreground task can append and snapshot
/// concurrently. A new aggregator is created for every execution; nothing
/// ever clears one.
#[derive(Debug, Clone, Default)]
pub struct OutputAggregator {
    fragments: Arc<Mutex<Vec<String>>>,
}

impl OutputAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment. Order of appends is order of calls.
    pub fn append(&self, fragment: &str) {
        self.lock().push(fragment.to_owned());
    }

    /// Concatenation of everything appended so far.
    pub fn snapshot(&self) -> String {
        self.lock().concat()
    }

    /// Number of fragments appended so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A sink closure that appends into this aggregator.
    pub fn sink(&self) -> OutputSink {
        let aggregator = self.clone();
        Arc::new(move |fragment: &str| aggregator.append(fragment))
    }

    // A panic while holding the lock cannot leave a half-pushed Vec behind,
    // so a poisoned buffer is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.fragments
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
