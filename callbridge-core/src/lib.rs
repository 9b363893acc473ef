//! # callbridge core
//!
//! Media engine abstractions shared by the bridge crates: engine object
//! traits, the engine bus with first-match routing, and the use-counted
//! conference and participant registries.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod codec;
pub mod engine;
pub mod error;
pub mod registry;
pub mod types;

// Re-export main types
pub use bus::{
    dispatch_first, BusDispatcher, BusHandler, BusOutcome, DtmfMethod, EngineMessage,
    EngineMessageKind,
};
pub use codec::{codec_lists_equal, Codec, CodecParameter, FeedbackParameter, RtpHeaderExtension};
pub use engine::{
    CodecListKind, ElementAddedHook, ElementParameter, EngineConference, EngineElement,
    EngineError, EngineParticipant, EngineResult, EngineSession, EngineStream, MediaEngine,
    SourceOutput, TransmitterConfig,
};
pub use error::{BridgeError, BridgeResult};
pub use registry::{
    ConferenceLease, ConferenceObserver, ConferenceRegistry, ParticipantLease,
    ParticipantRegistry, RefArena, RegistryMetrics, Release, SharedConferences,
    SharedParticipants,
};
pub use types::{
    CallStateChangeReason, ContactHandle, ContentFailure, Direction, MediaType, ObjectId,
    PacketizationType, SendingState, NO_CONTACT,
};
