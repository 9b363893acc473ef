//! # callbridge signaling
//!
//! Call signaling side of the bridge: typed property bundles for channels,
//! contents, streams and media descriptions, the [`SignalingPeer`] trait the
//! bridge drives, and translation between protocol records and engine types.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod peer;
pub mod protocol;
pub mod translate;

// Re-export main types
pub use peer::{MediaDescriptionProxy, PeerError, PeerEvent, PeerInterface, SignalKind, SignalingPeer};
pub use protocol::{
    decode, interface, validate_object_path, ChannelProperties, ContentProperties,
    HeaderExtensionRecord, MediaDescription, MediaProperties, OfferReference, PropertyBundle,
    PropertyError, ProtocolCodec, RtcpFeedbackEntry, RtcpFeedbackMessage, StreamProperties,
    StreamTransport, VideoControlProperties, VideoResolution, NO_OBJECT_PATH,
    REPORTING_INTERVAL_UNSET,
};
