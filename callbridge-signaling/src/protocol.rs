//! Call signaling protocol types
//!
//! Property bundles arrive from the peer as string-keyed maps of loosely
//! typed values. Each interface gets a serde struct so a bundle is checked
//! in one place and handlers only see typed data.

use callbridge_core::{BridgeError, BridgeResult, ContactHandle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// String-keyed property map as delivered by the peer
pub type PropertyBundle = serde_json::Map<String, Value>;

/// Interface names used in property fetches and bundles
pub mod interface {
    /// Call channel
    pub const CHANNEL: &str = "org.callbridge.Call.Channel";
    /// Call content
    pub const CONTENT: &str = "org.callbridge.Call.Content";
    /// Media part of a content
    pub const CONTENT_MEDIA: &str = "org.callbridge.Call.Content.Interface.Media";
    /// Video control part of a content
    pub const VIDEO_CONTROL: &str = "org.callbridge.Call.Content.Interface.VideoControl";
    /// Call stream
    pub const STREAM: &str = "org.callbridge.Call.Stream";
    /// Media description
    pub const MEDIA_DESCRIPTION: &str = "org.callbridge.Call.Content.MediaDescription";
    /// RTCP feedback extension of a media description
    pub const RTCP_FEEDBACK: &str =
        "org.callbridge.Call.Content.MediaDescription.Interface.RTCPFeedback";
    /// RTP header extension extension of a media description
    pub const RTP_HEADER_EXTENSIONS: &str =
        "org.callbridge.Call.Content.MediaDescription.Interface.RTPHeaderExtensions";
}

/// Object path meaning "no object"
pub const NO_OBJECT_PATH: &str = "/";

/// RTCP minimum interval value meaning "unset"
pub const REPORTING_INTERVAL_UNSET: u32 = u32::MAX;

/// A bundle did not match the shape of its interface
#[derive(Error, Debug)]
#[error("Invalid {interface} properties: {source}")]
pub struct PropertyError {
    /// Interface being decoded
    pub interface: String,
    /// Decoding failure
    #[source]
    pub source: serde_json::Error,
}

impl From<PropertyError> for BridgeError {
    fn from(err: PropertyError) -> Self {
        BridgeError::InvalidProperty {
            interface: err.interface,
            reason: err.source.to_string(),
        }
    }
}

/// Decode a bundle into the typed properties of `interface`
pub fn decode<T: DeserializeOwned>(
    interface: &str,
    bundle: &PropertyBundle,
) -> Result<T, PropertyError> {
    serde_json::from_value(Value::Object(bundle.clone())).map_err(|source| PropertyError {
        interface: interface.to_string(),
        source,
    })
}

/// Check that `path` is a well formed object path
pub fn validate_object_path(path: &str) -> BridgeResult<()> {
    let invalid = || BridgeError::InvalidObjectPath {
        path: path.to_string(),
    };

    if path == NO_OBJECT_PATH {
        return Ok(());
    }
    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    for element in rest.split('/') {
        if element.is_empty()
            || !element
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Channel properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelProperties {
    /// Whether the connection manager streams media itself
    #[serde(default)]
    pub hardware_streaming: bool,
    /// Content object paths
    #[serde(default)]
    pub contents: Vec<String>,
}

/// Content properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentProperties {
    /// Extra interfaces implemented by the content
    pub interfaces: Vec<String>,
    /// Media type wire value
    #[serde(rename = "Type")]
    pub media_type: u32,
    /// Stream object paths
    pub streams: Vec<String>,
}

/// Reference to a media description offer: (path, contact, properties)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferReference(pub String, pub ContactHandle, pub PropertyBundle);

impl OfferReference {
    /// Offer object path, `/` when there is no offer
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Contact the offer comes from
    pub fn contact(&self) -> ContactHandle {
        self.1
    }

    /// Offer properties
    pub fn properties(&self) -> &PropertyBundle {
        &self.2
    }

    /// Whether this refers to an actual offer
    pub fn is_present(&self) -> bool {
        self.0 != NO_OBJECT_PATH
    }
}

/// Media interface properties of a content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaProperties {
    /// Packetization wire value
    pub packetization: u32,
    /// Outstanding offer
    pub media_description_offer: OfferReference,
    /// DTMF sending state wire value
    #[serde(rename = "CurrentDTMFState")]
    pub current_dtmf_state: u32,
    /// DTMF event
    #[serde(rename = "CurrentDTMFEvent")]
    pub current_dtmf_event: u8,
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct VideoResolution {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl From<(u32, u32)> for VideoResolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<VideoResolution> for (u32, u32) {
    fn from(resolution: VideoResolution) -> Self {
        (resolution.width, resolution.height)
    }
}

/// Video control properties of a content; absent values read as zero
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VideoControlProperties {
    /// Target bitrate
    pub bitrate: u32,
    /// Maximum packet size
    #[serde(rename = "MTU")]
    pub mtu: u32,
    /// Whether keyframes are only sent on request
    pub manual_key_frames: bool,
    /// Requested resolution
    pub video_resolution: VideoResolution,
    /// Requested framerate
    pub framerate: u32,
}

/// Stream transport wire values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTransport {
    /// Plain UDP
    RawUdp,
    /// ICE
    Ice,
    /// Google Talk P2P
    GtalkP2p,
    /// WLM 2009
    Wlm2009,
    /// Shared memory
    Shm,
    /// Multicast
    Multicast,
}

impl StreamTransport {
    /// Map the wire value used by the peer
    pub fn from_protocol(value: u32) -> Option<Self> {
        match value {
            1 => Some(StreamTransport::RawUdp),
            2 => Some(StreamTransport::Ice),
            3 => Some(StreamTransport::GtalkP2p),
            4 => Some(StreamTransport::Wlm2009),
            5 => Some(StreamTransport::Shm),
            6 => Some(StreamTransport::Multicast),
            _ => None,
        }
    }

    /// Engine transmitter implementing this transport
    pub fn transmitter(self) -> &'static str {
        match self {
            StreamTransport::RawUdp => "rawudp",
            StreamTransport::Ice | StreamTransport::GtalkP2p | StreamTransport::Wlm2009 => "nice",
            StreamTransport::Shm => "shm",
            StreamTransport::Multicast => "multicast",
        }
    }
}

/// Stream properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamProperties {
    /// Remote contact
    pub contact: ContactHandle,
    /// Transport wire value
    pub transport: u32,
    /// Extra transmitter parameters
    #[serde(default)]
    pub transmitter_parameters: BTreeMap<String, String>,
    /// Local sending state wire value
    #[serde(default)]
    pub local_sending_state: u32,
}

/// Codec record exchanged with the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtocolCodec {
    /// Payload type
    pub identifier: u32,
    /// Encoding name
    pub name: String,
    /// Clock rate
    pub clock_rate: u32,
    /// Channel count
    pub channels: u32,
    /// Whether the configuration changed since it was last sent
    #[serde(default)]
    pub updated: bool,
    /// Codec parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// One RTCP feedback message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RtcpFeedbackMessage {
    /// Feedback type
    #[serde(rename = "Type")]
    pub kind: String,
    /// Feedback subtype
    pub subtype: String,
    /// Extra parameters
    #[serde(default)]
    pub parameters: String,
}

fn unset_reporting_interval() -> u32 {
    REPORTING_INTERVAL_UNSET
}

/// RTCP feedback settings for one payload type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RtcpFeedbackEntry {
    /// Minimum reporting interval in milliseconds
    #[serde(default = "unset_reporting_interval")]
    pub minimum_reporting_interval: u32,
    /// Feedback messages
    #[serde(default)]
    pub messages: Vec<RtcpFeedbackMessage>,
}

/// Header extension record exchanged with the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeaderExtensionRecord {
    /// Extension id
    pub id: u32,
    /// Direction wire value
    pub direction: u32,
    /// Extension URI
    pub uri: String,
    /// Extension parameters
    #[serde(default)]
    pub parameters: String,
}

/// Media description, both as offered by the peer and as answered locally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaDescription {
    /// Extension interfaces present in this description
    #[serde(default)]
    pub interfaces: Vec<String>,
    /// Codecs, required on offers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codecs: Option<Vec<ProtocolCodec>>,
    /// Whether some codec configuration still has to be exchanged
    #[serde(default)]
    pub further_negotiation_required: bool,
    /// RTCP feedback per payload type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_messages: Option<BTreeMap<u32, RtcpFeedbackEntry>>,
    /// Whether AVPF is in use
    #[serde(rename = "DoesAVPF", default, skip_serializing_if = "Option::is_none")]
    pub does_avpf: Option<bool>,
    /// Header extensions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_extensions: Option<Vec<HeaderExtensionRecord>>,
}

impl MediaDescription {
    /// Whether an extension interface is listed
    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i == name)
    }

    /// Codecs, empty when absent
    pub fn codec_list(&self) -> &[ProtocolCodec] {
        self.codecs.as_deref().unwrap_or_default()
    }
}
