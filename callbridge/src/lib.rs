//! # callbridge
//!
//! Bridges call-signaling channels to a real-time media engine. The signaling
//! peer describes calls as channels holding contents (one per media line)
//! holding streams (one per remote contact). The bridge mirrors that tree onto
//! engine conferences, sessions and streams, negotiates codecs through media
//! description offers and answers, drives DTMF and applies video tuning.
//!
//! ## Key Features
//!
//! - **Shared engine objects**: one conference per packetization and one
//!   engine stream per contact, use-counted across contents and call streams
//! - **Offer/answer**: remote offers are accepted or rejected once a stream
//!   exists for their contact; local codec updates are sent only when changed
//! - **DTMF**: peer requests are cross-checked against the engine's own
//!   started/stopped reports
//! - **First-match bus routing**: each engine message is claimed by the one
//!   channel, content or stream that owns its origin
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callbridge::{Bridge, BridgeConfig, BridgeInput};
//! use callbridge::testing::{FakeEngine, RecordingPeer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::default();
//!     callbridge::init_logging(&config.logging)?;
//!
//!     let (mut bridge, mut events) = Bridge::new(FakeEngine::new(), config);
//!     bridge.add_channel("/call/1", RecordingPeer::new())?;
//!
//!     let (inbox, rx) = tokio::sync::mpsc::unbounded_channel();
//!     let running = tokio::spawn(bridge.run(rx));
//!
//!     // Peer notifications and engine bus messages go into `inbox`
//!     inbox.send(BridgeInput::Shutdown)?;
//!     running.await?;
//!
//!     for event in events.drain() {
//!         println!("Bridge event: {:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use callbridge_core::{
    BridgeError, BridgeResult, BusOutcome, CallStateChangeReason, Codec, ContactHandle,
    ContentFailure, DtmfMethod, ElementParameter, EngineConference, EngineElement, EngineError,
    EngineMessage, EngineMessageKind, EngineParticipant, EngineResult, EngineSession,
    EngineStream, MediaEngine, MediaType, ObjectId, PacketizationType, RtpHeaderExtension,
    SendingState, SourceOutput,
};

pub use callbridge_media::{SourceOutputIter, VideoNotice, DTMF_TONE_VOLUME};

pub use callbridge_signaling::{
    MediaDescription, MediaDescriptionProxy, PeerError, PeerEvent, PeerInterface,
    PropertyBundle, SignalKind, SignalingPeer,
};

pub use callbridge_diagnostics::{init_logging, BusTrace, BusTraceRecord, LoggingConfig};

// Public API modules
pub mod bridge;
pub mod channel;
pub mod config;
pub mod content;
pub mod event;
pub mod negotiator;
pub mod stream;
pub mod testing;

// Re-export main API types
pub use bridge::{Bridge, BridgeInput};
pub use channel::{CallChannel, CallResources, ChannelInput};
pub use config::{BridgeConfig, DEFAULT_REPORTING_INTERVAL_MS};
pub use content::{CallContent, ContentPhase};
pub use event::{event_channel, BridgeEvent, EventSender, EventStream};
pub use negotiator::{MediaDescriptionNegotiator, NegotiationState, SendOutcome};
pub use stream::CallStream;
