//! # callbridge diagnostics
//!
//! Logging setup and a bounded trace of engine bus routing decisions.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod bus_trace;
pub mod logging;

// Re-export main types
pub use bus_trace::{BusTrace, BusTraceRecord, DEFAULT_TRACE_CAPACITY};
pub use logging::{init_logging, LoggingConfig};
