//! # callbridge media
//!
//! Per-content media state driven against the engine: the thread-safe
//! stream pool, the DTMF state machine and video tuning.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod dtmf;
pub mod error;
pub mod stream_pool;
pub mod video_control;

// Re-export main types
pub use dtmf::{
    DtmfCommand, DtmfController, DtmfEffect, DtmfMachine, DtmfTransition, DTMF_TONE_VOLUME,
};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use stream_pool::{SourceOutputIter, StreamLease, StreamPool};
pub use video_control::{VideoControlAdapter, VideoNotice, VideoTuning};
