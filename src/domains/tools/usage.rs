//! Tool usage accounting.
//!
//! Usage is collected through an observer handed to the registry explicitly,
//! so there is no process-wide counter state.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// How a single tool invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded,
    Failed,
}

/// Receives one notification per completed tool invocation.
pub trait UsageObserver: Send + Sync {
    fn record(&self, tool: &str, outcome: InvocationOutcome);
}

/// Per-tool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToolUsage {
    pub calls: u64,
    pub failures: u64,
}

/// In-memory [`UsageObserver`] counting calls and failures per tool.
#[derive(Debug, Default)]
pub struct UsageCounter {
    counts: Mutex<BTreeMap<String, ToolUsage>>,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters, keyed by tool name.
    pub fn snapshot(&self) -> BTreeMap<String, ToolUsage> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UsageObserver for UsageCounter {
    fn record(&self, tool: &str, outcome: InvocationOutcome) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let usage = counts.entry(tool.to_string()).or_default();
        usage.calls += 1;
        if outcome == InvocationOutcome::Failed {
            usage.failures += 1;
        }
    }
}
