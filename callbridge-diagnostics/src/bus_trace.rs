//! Bounded history of engine bus routing decisions

use callbridge_core::{BusOutcome, EngineMessage, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of records kept
pub const DEFAULT_TRACE_CAPACITY: usize = 256;

/// One routed bus message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusTraceRecord {
    /// When the message was routed
    pub at: DateTime<Utc>,
    /// Message kind
    pub kind: String,
    /// Object that posted the message
    pub origin: ObjectId,
    /// Routing verdict
    pub outcome: BusOutcome,
}

/// Ring buffer of the most recent routing decisions
#[derive(Debug, Clone)]
pub struct BusTrace {
    records: VecDeque<BusTraceRecord>,
    capacity: usize,
    total: u64,
    unhandled: u64,
}

impl Default for BusTrace {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}

impl BusTrace {
    /// Trace keeping at most `capacity` records; 0 only counts
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_TRACE_CAPACITY)),
            capacity,
            total: 0,
            unhandled: 0,
        }
    }

    /// Record how `message` was routed
    pub fn record(&mut self, message: &EngineMessage, outcome: BusOutcome) {
        self.total += 1;
        if !outcome.is_handled() {
            self.unhandled += 1;
            tracing::trace!(
                "Bus message {} from {} was not handled",
                message.kind_name(),
                message.origin
            );
        }

        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(BusTraceRecord {
            at: Utc::now(),
            kind: message.kind_name().to_string(),
            origin: message.origin,
            outcome,
        });
    }

    /// Kept records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &BusTraceRecord> {
        self.records.iter()
    }

    /// Most recent record
    pub fn last(&self) -> Option<&BusTraceRecord> {
        self.records.back()
    }

    /// Number of kept records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is kept
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Messages recorded since creation
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Messages nobody claimed since creation
    pub fn unhandled(&self) -> u64 {
        self.unhandled
    }

    /// Forget kept records; counters are preserved
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Kept records as a JSON array
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }
}
