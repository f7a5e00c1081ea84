//! Process-lifetime event counters.
//!
//! Handlers receive a [`MetricsSink`] instead of touching globals, so tests can
//! hand each case its own counters and read them back with [`MetricsSink::snapshot`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Message events with a subtype the bot does not inspect.
    Ignored,
    Regular,
    Changed,
    Matched,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub ignored: u64,
    pub regular: u64,
    pub changed: u64,
    pub matched: u64,
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignored: {}, regular: {}, changed: {}, matched: {}",
            self.ignored, self.regular, self.changed, self.matched
        )
    }
}

pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: Counter);
    fn snapshot(&self) -> CounterSnapshot;
}

#[derive(Debug, Default)]
pub struct AtomicCounters {
    ignored: AtomicU64,
    regular: AtomicU64,
    changed: AtomicU64,
    matched: AtomicU64,
}

impl AtomicCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Ignored => &self.ignored,
            Counter::Regular => &self.regular,
            Counter::Changed => &self.changed,
            Counter::Matched => &self.matched,
        }
    }
}

impl MetricsSink for AtomicCounters {
    fn increment(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            ignored: self.ignored.load(Ordering::Relaxed),
            regular: self.regular.load(Ordering::Relaxed),
            changed: self.changed.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
        }
    }
}
