//! Signaling peer abstraction
//!
//! The peer is the remote call-control service. The bridge talks to it
//! through [`SignalingPeer`] and hears back through [`PeerEvent`]s that the
//! embedding delivers to the owning channel in arrival order.

use crate::protocol::{interface, MediaDescription, PropertyBundle, VideoResolution};
use callbridge_core::{CallStateChangeReason, ContactHandle, ContentFailure, SendingState};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by the peer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    /// The remote side answered with an error
    #[error("{name}: {message}")]
    Remote {
        /// Error name
        name: String,
        /// Error message
        message: String,
    },

    /// The object does not exist on the peer
    #[error("No such object: {path}")]
    NoSuchObject {
        /// Object path
        path: String,
    },

    /// The peer went away
    #[error("Peer disconnected")]
    Disconnected,
}

/// Property interfaces the bridge fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerInterface {
    /// Channel properties
    Channel,
    /// Content properties
    Content,
    /// Content media properties
    ContentMedia,
    /// Content video control properties
    VideoControl,
    /// Stream properties
    Stream,
}

impl PeerInterface {
    /// Interface name
    pub fn name(self) -> &'static str {
        match self {
            PeerInterface::Channel => interface::CHANNEL,
            PeerInterface::Content => interface::CONTENT,
            PeerInterface::ContentMedia => interface::CONTENT_MEDIA,
            PeerInterface::VideoControl => interface::VIDEO_CONTROL,
            PeerInterface::Stream => interface::STREAM,
        }
    }
}

/// Peer signals the bridge subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Content added to a channel
    ContentAdded,
    /// Content removed from a channel
    ContentRemoved,
    /// Streams added to a content
    StreamsAdded,
    /// Streams removed from a content
    StreamsRemoved,
    /// New media description offer
    NewMediaDescriptionOffer,
    /// DTMF change requested
    DtmfChangeRequested,
    /// Keyframe requested
    KeyFrameRequested,
    /// Video resolution changed
    VideoResolutionChanged,
    /// Bitrate changed
    BitrateChanged,
    /// Framerate changed
    FramerateChanged,
    /// MTU changed
    MtuChanged,
    /// Local sending state of a stream changed
    LocalSendingStateChanged,
}

impl SignalKind {
    /// Signal name
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::ContentAdded => "ContentAdded",
            SignalKind::ContentRemoved => "ContentRemoved",
            SignalKind::StreamsAdded => "StreamsAdded",
            SignalKind::StreamsRemoved => "StreamsRemoved",
            SignalKind::NewMediaDescriptionOffer => "NewMediaDescriptionOffer",
            SignalKind::DtmfChangeRequested => "DTMFChangeRequested",
            SignalKind::KeyFrameRequested => "KeyFrameRequested",
            SignalKind::VideoResolutionChanged => "VideoResolutionChanged",
            SignalKind::BitrateChanged => "BitrateChanged",
            SignalKind::FramerateChanged => "FramerateChanged",
            SignalKind::MtuChanged => "MTUChanged",
            SignalKind::LocalSendingStateChanged => "LocalSendingStateChanged",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle on a remote media description offer.
///
/// Moving it into [`SignalingPeer::accept_media_description`] or
/// [`SignalingPeer::reject_media_description`] answers the offer; dropping
/// it releases it unanswered.
pub struct MediaDescriptionProxy {
    path: String,
    live: Option<Arc<AtomicUsize>>,
}

impl MediaDescriptionProxy {
    /// Create an untracked proxy
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            live: None,
        }
    }

    /// Create a proxy counted in `live` until dropped
    pub fn tracked(path: impl Into<String>, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            path: path.into(),
            live: Some(live),
        }
    }

    /// Object path of the offer
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Debug for MediaDescriptionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDescriptionProxy")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for MediaDescriptionProxy {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Outbound operations on the peer.
///
/// Calls are fire-and-forget; results come back as [`PeerEvent`]s and
/// failures of answer-type calls are the peer's to log.
pub trait SignalingPeer: Send + Sync + Debug {
    /// Fetch all properties of `interface` on `object_path`; answered by
    /// [`PeerEvent::PropertiesFetched`]
    fn fetch_properties(&self, object_path: &str, interface: PeerInterface);

    /// Subscribe to a signal on `object_path`
    fn subscribe(&self, object_path: &str, signal: SignalKind) -> Result<(), PeerError>;

    /// Bind a proxy to a remote media description
    fn media_description_proxy(&self, object_path: &str) -> MediaDescriptionProxy {
        MediaDescriptionProxy::new(object_path)
    }

    /// Accept an offer with the local answer
    fn accept_media_description(&self, offer: MediaDescriptionProxy, local: MediaDescription);

    /// Reject an offer
    fn reject_media_description(&self, offer: MediaDescriptionProxy);

    /// Publish an unsolicited local description update
    fn update_local_media_description(
        &self,
        content: &str,
        contact: ContactHandle,
        local: MediaDescription,
    );

    /// Report the current DTMF state
    fn acknowledge_dtmf_change(&self, content: &str, event: u8, state: SendingState);

    /// Mark a content as failed
    fn fail_content(&self, content: &str, failure: &ContentFailure);

    /// Hang up a channel
    fn hangup(
        &self,
        channel: &str,
        reason: CallStateChangeReason,
        detailed_reason: &str,
        message: &str,
    );
}

/// Inbound notification from the peer
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Answer to [`SignalingPeer::fetch_properties`]
    PropertiesFetched {
        /// Object path
        object_path: String,
        /// Interface fetched
        interface: PeerInterface,
        /// Bundle or failure
        result: Result<PropertyBundle, PeerError>,
    },
    /// Content added to the channel
    ContentAdded {
        /// Content path
        content: String,
    },
    /// Content removed from the channel
    ContentRemoved {
        /// Content path
        content: String,
    },
    /// Streams added to a content
    StreamsAdded {
        /// Content path
        content: String,
        /// Stream paths
        streams: Vec<String>,
    },
    /// Streams removed from a content
    StreamsRemoved {
        /// Content path
        content: String,
        /// Stream paths
        streams: Vec<String>,
    },
    /// New media description offer
    NewMediaDescriptionOffer {
        /// Content path
        content: String,
        /// Offer path
        description: String,
        /// Remote contact
        contact: ContactHandle,
        /// Offer properties
        properties: PropertyBundle,
    },
    /// DTMF change requested
    DtmfChangeRequested {
        /// Content path
        content: String,
        /// Event code
        event: u8,
        /// Target sending state wire value
        state: u32,
    },
    /// Keyframe requested
    KeyFrameRequested {
        /// Content path
        content: String,
    },
    /// Video resolution changed
    VideoResolutionChanged {
        /// Content path
        content: String,
        /// New resolution
        resolution: VideoResolution,
    },
    /// Bitrate changed
    BitrateChanged {
        /// Content path
        content: String,
        /// New bitrate
        bitrate: u32,
    },
    /// Framerate changed
    FramerateChanged {
        /// Content path
        content: String,
        /// New framerate
        framerate: u32,
    },
    /// MTU changed
    MtuChanged {
        /// Content path
        content: String,
        /// New MTU
        mtu: u32,
    },
    /// Local sending state of a stream changed
    LocalSendingStateChanged {
        /// Stream path
        stream: String,
        /// Sending state wire value
        state: u32,
    },
}

impl PeerEvent {
    /// Short stable name for logs
    pub fn event_type(&self) -> &'static str {
        match self {
            PeerEvent::PropertiesFetched { .. } => "properties_fetched",
            PeerEvent::ContentAdded { .. } => "content_added",
            PeerEvent::ContentRemoved { .. } => "content_removed",
            PeerEvent::StreamsAdded { .. } => "streams_added",
            PeerEvent::StreamsRemoved { .. } => "streams_removed",
            PeerEvent::NewMediaDescriptionOffer { .. } => "new_media_description_offer",
            PeerEvent::DtmfChangeRequested { .. } => "dtmf_change_requested",
            PeerEvent::KeyFrameRequested { .. } => "key_frame_requested",
            PeerEvent::VideoResolutionChanged { .. } => "video_resolution_changed",
            PeerEvent::BitrateChanged { .. } => "bitrate_changed",
            PeerEvent::FramerateChanged { .. } => "framerate_changed",
            PeerEvent::MtuChanged { .. } => "mtu_changed",
            PeerEvent::LocalSendingStateChanged { .. } => "local_sending_state_changed",
        }
    }

    /// Content path the event is addressed to, if it targets a content
    pub fn content_path(&self) -> Option<&str> {
        match self {
            PeerEvent::StreamsAdded { content, .. }
            | PeerEvent::StreamsRemoved { content, .. }
            | PeerEvent::NewMediaDescriptionOffer { content, .. }
            | PeerEvent::DtmfChangeRequested { content, .. }
            | PeerEvent::KeyFrameRequested { content }
            | PeerEvent::VideoResolutionChanged { content, .. }
            | PeerEvent::BitrateChanged { content, .. }
            | PeerEvent::FramerateChanged { content, .. }
            | PeerEvent::MtuChanged { content, .. } => Some(content),
            _ => None,
        }
    }
}
