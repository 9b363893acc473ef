//! Media engine abstraction
//!
//! The bridge never touches a concrete media framework. Everything it needs
//! from the engine goes through these traits: conferences own sessions and
//! participants, sessions own streams, and element hooks see every element
//! the engine instantiates inside a conference. Engine objects are shared
//! (`Arc<dyn ...>`) because the engine's streaming threads hold them too.

use crate::codec::{Codec, RtpHeaderExtension};
use crate::types::{Direction, MediaType, ObjectId};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a media engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine has no conference implementation for this type
    #[error("Unsupported conference type: {conference_type}")]
    UnsupportedConference {
        /// Conference type requested
        conference_type: String,
    },

    /// An engine object could not be constructed
    #[error("Could not construct {object}: {reason}")]
    Construction {
        /// Kind of object
        object: String,
        /// Engine reason
        reason: String,
    },

    /// Codec negotiation was refused
    #[error("Codec negotiation failed: {reason}")]
    Negotiation {
        /// Engine reason
        reason: String,
    },

    /// A transmitter could not be configured
    #[error("Transmitter {transmitter} failed: {reason}")]
    Transmitter {
        /// Transmitter name
        transmitter: String,
        /// Engine reason
        reason: String,
    },

    /// A telephony event could not be started or stopped
    #[error("Telephony event failed: {reason}")]
    TelephonyEvent {
        /// Engine reason
        reason: String,
    },
}

/// Engine result alias
pub type EngineResult<T> = Result<T, EngineError>;

/// Which local codec list to query from a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecListKind {
    /// Codecs usable before their configuration is known
    WithoutConfig,
    /// Codecs with full configuration, required once sending
    Full,
}

impl CodecListKind {
    /// Engine property name for this list
    pub fn property_name(self) -> &'static str {
        match self {
            CodecListKind::WithoutConfig => "codecs-without-config",
            CodecListKind::Full => "codecs",
        }
    }
}

/// Transmitter selection plus its parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitterConfig {
    /// Transmitter name, e.g. `rawudp` or `nice`
    pub transmitter: String,
    /// Transmitter parameters
    pub parameters: BTreeMap<String, String>,
}

impl TransmitterConfig {
    /// Create a config without parameters
    pub fn new(transmitter: impl Into<String>) -> Self {
        Self {
            transmitter: transmitter.into(),
            parameters: BTreeMap::new(),
        }
    }
}

/// Decoded media output exposed by a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutput {
    /// Output name
    pub name: String,
    /// Codec being received, when known
    pub codec: Option<Codec>,
}

/// Tunable element parameters the bridge knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementParameter {
    /// Maximum payload size
    Mtu,
    /// Maximum distance between keyframes
    KeyIntMax,
    /// Intra refresh period
    IntraPeriod,
}

impl ElementParameter {
    /// Engine property name
    pub fn name(self) -> &'static str {
        match self {
            ElementParameter::Mtu => "mtu",
            ElementParameter::KeyIntMax => "key-int-max",
            ElementParameter::IntraPeriod => "intra-period",
        }
    }
}

/// Element instantiated by the engine inside a conference
pub trait EngineElement: Send + Sync + Debug {
    /// Element name
    fn name(&self) -> String;

    /// Set a parameter if the element has it; `None` when the element lacks it
    fn set_parameter(&self, parameter: ElementParameter, value: i64) -> Option<()>;
}

/// Observer invoked for every element added to a conference, from engine threads
pub trait ElementAddedHook: Send + Sync + Debug {
    /// Inspect a freshly added element
    fn element_added(&self, element: &dyn EngineElement);
}

/// Factory for conferences
pub trait MediaEngine: Send + Sync + Debug {
    /// Instantiate a conference of the given type (`rtp`, `raw`)
    fn create_conference(&self, conference_type: &str) -> EngineResult<Arc<dyn EngineConference>>;
}

/// Engine conference shared by all sessions of one call
pub trait EngineConference: Send + Sync + Debug {
    /// Identity used by bus messages
    fn id(&self) -> ObjectId;

    /// Conference type this object was created for
    fn conference_type(&self) -> String;

    /// Create a session for one media type
    fn new_session(&self, media_type: MediaType) -> EngineResult<Arc<dyn EngineSession>>;

    /// Create a participant
    fn new_participant(&self) -> EngineResult<Arc<dyn EngineParticipant>>;

    /// Default codec preferences shipped with the engine, possibly empty
    fn default_codec_preferences(&self, media_type: MediaType) -> Vec<Codec>;

    /// Register an element hook; it also sees elements already present
    fn add_element_hook(&self, hook: Arc<dyn ElementAddedHook>);

    /// Unregister an element hook
    fn remove_element_hook(&self, hook: &Arc<dyn ElementAddedHook>);
}

/// Remote party inside a conference
pub trait EngineParticipant: Send + Sync + Debug {
    /// Identity used by bus messages
    fn id(&self) -> ObjectId;
}

/// One media type's worth of negotiation and streaming
pub trait EngineSession: Send + Sync + Debug {
    /// Identity used by bus messages
    fn id(&self) -> ObjectId;

    /// Create a stream towards a participant
    fn new_stream(
        &self,
        participant: &Arc<dyn EngineParticipant>,
        direction: Direction,
    ) -> EngineResult<Arc<dyn EngineStream>>;

    /// Apply codec preferences
    fn set_codec_preferences(&self, codecs: &[Codec]) -> EngineResult<()>;

    /// Current local codecs, `None` while the engine is not ready
    fn codecs(&self, kind: CodecListKind) -> Option<Vec<Codec>>;

    /// Codecs whose configuration changed between two lists
    fn codecs_need_resend(&self, old: &[Codec], new: &[Codec]) -> Vec<Codec>;

    /// Header extensions the session currently supports
    fn rtp_header_extensions(&self) -> Vec<RtpHeaderExtension>;

    /// Start a telephony event
    fn start_telephony_event(&self, event: u8, volume: u8) -> EngineResult<()>;

    /// Stop the active telephony event
    fn stop_telephony_event(&self) -> EngineResult<()>;

    /// Target send bitrate in bits per second
    fn set_send_bitrate(&self, bitrate: u32);

    /// Ask the encoder for a keyframe
    fn request_keyframe(&self) -> EngineResult<()>;

    /// Release engine resources
    fn dispose(&self);
}

/// Media stream between the session and one participant
pub trait EngineStream: Send + Sync + Debug {
    /// Identity used by bus messages
    fn id(&self) -> ObjectId;

    /// Participant this stream talks to
    fn participant(&self) -> ObjectId;

    /// Configure the transmitter
    fn set_transmitter(&self, config: &TransmitterConfig) -> EngineResult<()>;

    /// Active header extensions; `None` when the stream does not support them
    fn rtp_header_extensions(&self) -> Option<Vec<RtpHeaderExtension>>;

    /// Replace the active header extensions
    fn set_rtp_header_extensions(&self, extensions: Vec<RtpHeaderExtension>);

    /// Apply remote codecs
    fn set_remote_codecs(&self, codecs: &[Codec]) -> EngineResult<()>;

    /// Decoded outputs currently exposed
    fn src_outputs(&self) -> Vec<SourceOutput>;

    /// Release engine resources
    fn dispose(&self);
}
