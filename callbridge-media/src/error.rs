//! Media-side error types
//!
//! Errors raised while driving engine streams, telephony events and video
//! tuning. They convert into [`BridgeError`] when they have to fail a content.

use callbridge_core::{BridgeError, ContactHandle, EngineError};
use thiserror::Error;

/// Main error type for media operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// Participant lookup or creation failed
    #[error("Participant unavailable for handle {handle}: {reason}")]
    ParticipantUnavailable {
        /// Contact handle
        handle: ContactHandle,
        /// Failure reason
        reason: String,
    },

    /// Engine refused to create a stream
    #[error("Stream creation failed for handle {handle}: {source}")]
    StreamCreation {
        /// Contact handle
        handle: ContactHandle,
        /// Engine failure
        source: EngineError,
    },

    /// Engine refused the transmitter
    #[error("Transmitter {transmitter} rejected: {source}")]
    TransmitterRejected {
        /// Transmitter name
        transmitter: String,
        /// Engine failure
        source: EngineError,
    },

    /// Telephony event could not be started or stopped
    #[error("Telephony event failed: {source}")]
    TelephonyEvent {
        /// Engine failure
        source: EngineError,
    },

    /// Keyframe request failed
    #[error("Keyframe request failed: {source}")]
    Keyframe {
        /// Engine failure
        source: EngineError,
    },

    /// DTMF change requested towards a state that cannot be requested
    #[error("Invalid DTMF target state {state}")]
    InvalidDtmfTarget {
        /// Requested state wire value
        state: u32,
    },

    /// Engine reported a DTMF transition that does not match local state
    #[error("DTMF state diverged: {message}")]
    DtmfDivergence {
        /// Description of the divergence
        message: String,
    },

    /// Operation needs a session that does not exist yet
    #[error("No session available")]
    NoSession,

    /// The stream pool was already torn down
    #[error("Stream pool disposed")]
    PoolDisposed,
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::TelephonyEvent { .. } => true,
            MediaError::Keyframe { .. } => true,
            MediaError::NoSession => true,
            _ => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::ParticipantUnavailable { .. } => ErrorCategory::Engine,
            MediaError::StreamCreation { .. } => ErrorCategory::Engine,
            MediaError::TransmitterRejected { .. } => ErrorCategory::Transport,
            MediaError::TelephonyEvent { .. } => ErrorCategory::Telephony,
            MediaError::Keyframe { .. } => ErrorCategory::Video,
            MediaError::InvalidDtmfTarget { .. } => ErrorCategory::Protocol,
            MediaError::DtmfDivergence { .. } => ErrorCategory::Telephony,
            MediaError::NoSession => ErrorCategory::State,
            MediaError::PoolDisposed => ErrorCategory::State,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Engine object construction
    Engine,
    /// Transmitter and network setup
    Transport,
    /// DTMF and telephony events
    Telephony,
    /// Video tuning
    Video,
    /// Peer protocol misuse
    Protocol,
    /// Lifecycle and state errors
    State,
}

impl From<MediaError> for BridgeError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::ParticipantUnavailable { handle, reason } => {
                BridgeError::ParticipantUnavailable { handle, reason }
            }
            MediaError::StreamCreation { handle, source } => BridgeError::StreamCreation {
                handle,
                reason: source.to_string(),
            },
            MediaError::TransmitterRejected {
                transmitter,
                source,
            } => BridgeError::TransmitterRejected {
                transmitter,
                reason: source.to_string(),
            },
            MediaError::InvalidDtmfTarget { state } => BridgeError::ProtocolViolation {
                message: format!("Invalid DTMF target state {}", state),
            },
            MediaError::DtmfDivergence { message } => BridgeError::DtmfDivergence { message },
            MediaError::TelephonyEvent { source } | MediaError::Keyframe { source } => {
                BridgeError::EngineSession {
                    message: source.to_string(),
                }
            }
            MediaError::NoSession => BridgeError::InvalidState {
                expected: "session".to_string(),
                actual: "none".to_string(),
            },
            MediaError::PoolDisposed => BridgeError::Disposed {
                object: "stream pool".to_string(),
            },
        }
    }
}
