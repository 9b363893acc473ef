//! Error types for callbridge

use crate::types::{CallStateChangeReason, ContactHandle, ContentFailure};
use thiserror::Error;

/// Detailed failure reasons attached to content failures
pub mod detail {
    /// The peer or the engine broke the call protocol
    pub const CONFUSED: &str = "callbridge.error.confused";
    /// The engine failed while streaming media
    pub const MEDIA_STREAMING_ERROR: &str = "callbridge.error.media-streaming-error";
    /// The requested packetization or media type is not supported
    pub const MEDIA_UNSUPPORTED_TYPE: &str = "callbridge.error.media-unsupported-type";
}

/// Main error type for callbridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration could not be loaded
    #[error("Invalid configuration: {reason}")]
    Configuration {
        /// Reason the configuration was rejected
        reason: String,
    },

    /// Object path is not syntactically valid
    #[error("Invalid object path: {path}")]
    InvalidObjectPath {
        /// Offending path
        path: String,
    },

    /// Property bundle could not be fetched from the peer
    #[error("Error getting {interface} properties: {reason}")]
    PropertyFetch {
        /// Interface being fetched
        interface: String,
        /// Reason reported by the peer
        reason: String,
    },

    /// Property bundle is missing a field or has a wrong type
    #[error("Invalid {interface} properties: {reason}")]
    InvalidProperty {
        /// Interface whose bundle was rejected
        interface: String,
        /// Reason the bundle was rejected
        reason: String,
    },

    /// Subscribing to a peer signal failed
    #[error("Failed to subscribe to {signal}: {reason}")]
    SignalSubscription {
        /// Signal name
        signal: String,
        /// Reason reported by the peer
        reason: String,
    },

    /// The peer violated the call protocol
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Description of the violation
        message: String,
    },

    /// Engine DTMF state diverged from the expected state
    #[error("DTMF state diverged: {message}")]
    DtmfDivergence {
        /// Description of the divergence
        message: String,
    },

    /// Packetization is not supported by this bridge
    #[error("Unsupported packetization type: {packetization}")]
    UnsupportedPacketization {
        /// Raw packetization value
        packetization: u32,
    },

    /// Conference could not be created or looked up
    #[error("Could not create engine conference of type {conference_type}: {reason}")]
    ConferenceUnavailable {
        /// Conference type requested
        conference_type: String,
        /// Engine failure reason
        reason: String,
    },

    /// Session could not be created
    #[error("Error creating session: {reason}")]
    SessionCreation {
        /// Engine failure reason
        reason: String,
    },

    /// Participant for a contact could not be created
    #[error("Could not create participant for handle {handle}: {reason}")]
    ParticipantUnavailable {
        /// Contact handle
        handle: ContactHandle,
        /// Engine failure reason
        reason: String,
    },

    /// Engine stream could not be created
    #[error("Could not create stream for handle {handle}: {reason}")]
    StreamCreation {
        /// Contact handle
        handle: ContactHandle,
        /// Engine failure reason
        reason: String,
    },

    /// Engine refused the transmitter configuration
    #[error("Could not set transmitter {transmitter}: {reason}")]
    TransmitterRejected {
        /// Transmitter name
        transmitter: String,
        /// Engine failure reason
        reason: String,
    },

    /// Engine session reported an error on the bus
    #[error("Error on session: {message}")]
    EngineSession {
        /// Engine message
        message: String,
    },

    /// Engine stream reported an error on the bus
    #[error("Error on stream: {message}")]
    EngineStream {
        /// Engine message
        message: String,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Object was already disposed
    #[error("Object already disposed: {object}")]
    Disposed {
        /// Object path or name
        object: String,
    },
}

impl BridgeError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            BridgeError::Configuration { .. } => "CONFIGURATION_INVALID".to_string(),
            BridgeError::InvalidObjectPath { .. } => "INVALID_OBJECT_PATH".to_string(),
            BridgeError::PropertyFetch { .. } => "PROPERTY_FETCH_FAILED".to_string(),
            BridgeError::InvalidProperty { .. } => "INVALID_PROPERTY".to_string(),
            BridgeError::SignalSubscription { .. } => "SIGNAL_SUBSCRIPTION_FAILED".to_string(),
            BridgeError::ProtocolViolation { .. } => "PROTOCOL_VIOLATION".to_string(),
            BridgeError::DtmfDivergence { .. } => "DTMF_DIVERGENCE".to_string(),
            BridgeError::UnsupportedPacketization { .. } => {
                "UNSUPPORTED_PACKETIZATION".to_string()
            }
            BridgeError::ConferenceUnavailable { .. } => "CONFERENCE_UNAVAILABLE".to_string(),
            BridgeError::SessionCreation { .. } => "SESSION_CREATION_FAILED".to_string(),
            BridgeError::ParticipantUnavailable { .. } => "PARTICIPANT_UNAVAILABLE".to_string(),
            BridgeError::StreamCreation { .. } => "STREAM_CREATION_FAILED".to_string(),
            BridgeError::TransmitterRejected { .. } => "TRANSMITTER_REJECTED".to_string(),
            BridgeError::EngineSession { .. } => "ENGINE_SESSION_ERROR".to_string(),
            BridgeError::EngineStream { .. } => "ENGINE_STREAM_ERROR".to_string(),
            BridgeError::InvalidState { .. } => "INVALID_STATE".to_string(),
            BridgeError::Disposed { .. } => "DISPOSED".to_string(),
        }
    }

    /// Failure report to send to the peer when this error kills a content
    pub fn failure(&self) -> ContentFailure {
        let (reason, detailed_reason) = match self {
            BridgeError::UnsupportedPacketization { .. }
            | BridgeError::ConferenceUnavailable { .. }
            | BridgeError::SessionCreation { .. } => (
                CallStateChangeReason::MediaError,
                detail::MEDIA_UNSUPPORTED_TYPE,
            ),
            BridgeError::DtmfDivergence { .. }
            | BridgeError::EngineSession { .. }
            | BridgeError::EngineStream { .. }
            | BridgeError::ParticipantUnavailable { .. }
            | BridgeError::StreamCreation { .. }
            | BridgeError::TransmitterRejected { .. } => (
                CallStateChangeReason::InternalError,
                detail::MEDIA_STREAMING_ERROR,
            ),
            _ => (CallStateChangeReason::InternalError, detail::CONFUSED),
        };

        ContentFailure {
            reason,
            detailed_reason: detailed_reason.to_string(),
            message: self.to_string(),
        }
    }
}

/// Result alias used across the bridge
pub type BridgeResult<T> = Result<T, BridgeError>;
