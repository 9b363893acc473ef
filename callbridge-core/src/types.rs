//! Identifiers and small enums shared by every callbridge crate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Remote party handle as assigned by the signaling peer
pub type ContactHandle = u32;

/// Contact used when a local media description update is not aimed at anyone in particular
pub const NO_CONTACT: ContactHandle = 0;

/// Identity of an engine object, used to match bus messages to their owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Allocate a process-unique identifier
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Media carried by a content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Audio media
    Audio,
    /// Video media
    Video,
}

impl MediaType {
    /// Map the wire value used by the peer
    pub fn from_protocol(value: u32) -> Option<Self> {
        match value {
            0 => Some(MediaType::Audio),
            1 => Some(MediaType::Video),
            _ => None,
        }
    }

    /// Wire value used by the peer
    pub fn as_protocol(self) -> u32 {
        match self {
            MediaType::Audio => 0,
            MediaType::Video => 1,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

/// Direction of media flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// No media
    None,
    /// Send only
    Send,
    /// Receive only
    Recv,
    /// Send and receive
    Both,
}

impl Direction {
    /// Map the wire value used by the peer
    pub fn from_protocol(value: u32) -> Option<Self> {
        match value {
            0 => Some(Direction::None),
            1 => Some(Direction::Send),
            2 => Some(Direction::Recv),
            3 => Some(Direction::Both),
            _ => None,
        }
    }

    /// Wire value used by the peer
    pub fn as_protocol(self) -> u32 {
        match self {
            Direction::None => 0,
            Direction::Send => 1,
            Direction::Recv => 2,
            Direction::Both => 3,
        }
    }
}

/// Sending state shared by DTMF tones and local stream sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SendingState {
    /// Nothing is being sent
    None,
    /// Sending was requested and is not yet confirmed
    PendingSend,
    /// Sending is active
    Sending,
    /// Stopping was requested and is not yet confirmed
    PendingStopSending,
}

impl SendingState {
    /// Map the wire value used by the peer
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(SendingState::None),
            1 => Some(SendingState::PendingSend),
            2 => Some(SendingState::Sending),
            3 => Some(SendingState::PendingStopSending),
            _ => None,
        }
    }

    /// Wire value used by the peer
    pub fn as_u32(self) -> u32 {
        match self {
            SendingState::None => 0,
            SendingState::PendingSend => 1,
            SendingState::Sending => 2,
            SendingState::PendingStopSending => 3,
        }
    }
}

impl fmt::Display for SendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SendingState::None => "none",
            SendingState::PendingSend => "pending-send",
            SendingState::Sending => "sending",
            SendingState::PendingStopSending => "pending-stop-sending",
        };
        f.write_str(name)
    }
}

/// Packetization requested for a content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketizationType {
    /// RTP packetization
    Rtp,
    /// Raw packetization
    Raw,
}

impl PacketizationType {
    /// Map the wire value used by the peer; unknown values are unsupported
    pub fn from_protocol(value: u32) -> Option<Self> {
        match value {
            0 => Some(PacketizationType::Rtp),
            1 => Some(PacketizationType::Raw),
            _ => None,
        }
    }

    /// Engine conference type implementing this packetization
    pub fn conference_type(self) -> &'static str {
        match self {
            PacketizationType::Rtp => "rtp",
            PacketizationType::Raw => "raw",
        }
    }
}

/// Reason attached to content failures and hangups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallStateChangeReason {
    /// No particular reason
    Unknown,
    /// The local side failed internally
    InternalError,
    /// Media could not be streamed
    MediaError,
}

impl CallStateChangeReason {
    /// Wire value used by the peer
    pub fn as_u32(self) -> u32 {
        match self {
            CallStateChangeReason::Unknown => 0,
            CallStateChangeReason::InternalError => 9,
            CallStateChangeReason::MediaError => 12,
        }
    }
}

/// Failure report delivered to the peer for a broken content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFailure {
    /// Coarse reason
    pub reason: CallStateChangeReason,
    /// Machine readable detailed reason
    pub detailed_reason: String,
    /// Human readable message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sending_state_wire_values() {
        for value in 0..4 {
            let state = SendingState::from_u32(value).unwrap();
            assert_eq!(state.as_u32(), value);
        }
        assert_eq!(SendingState::from_u32(4), None);
    }

    #[test]
    fn test_packetization_conference_types() {
        assert_eq!(PacketizationType::from_protocol(0).unwrap().conference_type(), "rtp");
        assert_eq!(PacketizationType::from_protocol(1).unwrap().conference_type(), "raw");
        assert_eq!(PacketizationType::from_protocol(2), None);
    }

    #[test]
    fn test_object_ids_are_unique() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        assert_ne!(a, b);
    }
}
