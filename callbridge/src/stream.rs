//! One logical call stream of a content
//!
//! A call stream learns its remote contact and transport from the peer,
//! then holds a lease on the engine stream for that contact. Several call
//! streams may share one engine stream.

use crate::event::{BridgeEvent, EventSender};
use callbridge_core::{
    BridgeError, BridgeResult, BusHandler, BusOutcome, ContactHandle, EngineMessage,
    EngineMessageKind, ObjectId, SendingState, TransmitterConfig,
};
use callbridge_media::{StreamLease, StreamPool};
use callbridge_signaling::translate::transmitter_config;
use callbridge_signaling::{
    decode, interface, PeerError, PeerInterface, PropertyBundle, SignalKind, SignalingPeer,
    StreamProperties,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Call stream state
#[derive(Debug)]
pub struct CallStream {
    path: String,
    content_path: String,
    peer: Arc<dyn SignalingPeer>,
    events: EventSender,
    contact: Option<ContactHandle>,
    sending_state: SendingState,
    lease: Option<StreamLease>,
}

impl CallStream {
    /// Stream at `path` belonging to `content_path`
    pub fn new(
        path: impl Into<String>,
        content_path: impl Into<String>,
        peer: Arc<dyn SignalingPeer>,
        events: EventSender,
    ) -> Self {
        Self {
            path: path.into(),
            content_path: content_path.into(),
            peer,
            events,
            contact: None,
            sending_state: SendingState::None,
            lease: None,
        }
    }

    /// Subscribe to sending changes and ask for the stream properties
    pub fn start(&mut self) -> BridgeResult<()> {
        self.peer
            .subscribe(&self.path, SignalKind::LocalSendingStateChanged)
            .map_err(|e| BridgeError::SignalSubscription {
                signal: SignalKind::LocalSendingStateChanged.to_string(),
                reason: e.to_string(),
            })?;
        self.peer.fetch_properties(&self.path, PeerInterface::Stream);
        Ok(())
    }

    /// Read the fetched properties; returns the contact and its transmitter
    pub fn on_properties(
        &mut self,
        result: Result<PropertyBundle, PeerError>,
    ) -> BridgeResult<(ContactHandle, TransmitterConfig)> {
        let bundle = result.map_err(|e| BridgeError::PropertyFetch {
            interface: interface::STREAM.to_string(),
            reason: e.to_string(),
        })?;
        let props: StreamProperties = decode(interface::STREAM, &bundle)?;
        let transmitter = transmitter_config(&props)?;

        self.contact = Some(props.contact);
        self.set_local_sending_state(props.local_sending_state);
        debug!(
            "Stream {} talks to contact {} over {}",
            self.path, props.contact, transmitter.transmitter
        );
        Ok((props.contact, transmitter))
    }

    /// Hold the engine stream
    pub fn attach(&mut self, lease: StreamLease) {
        self.lease = Some(lease);
    }

    /// Record a new local sending state; unknown values are ignored
    pub fn set_local_sending_state(&mut self, state: u32) {
        match SendingState::from_u32(state) {
            Some(state) => self.sending_state = state,
            None => warn!("Ignoring unknown sending state {} on {}", state, self.path),
        }
    }

    /// Whether this stream counts as sending
    pub fn is_sending(&self) -> bool {
        matches!(
            self.sending_state,
            SendingState::Sending | SendingState::PendingSend
        )
    }

    /// Return the engine stream to the pool
    pub fn release(&mut self, pool: &StreamPool) {
        if let Some(lease) = self.lease.take() {
            pool.put(lease);
        }
    }

    /// Object path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Remote contact once known
    pub fn contact(&self) -> Option<ContactHandle> {
        self.contact
    }

    /// Local sending state
    pub fn sending_state(&self) -> SendingState {
        self.sending_state
    }

    /// Engine stream identity while attached
    pub fn stream_id(&self) -> Option<ObjectId> {
        self.lease.as_ref().map(|lease| lease.stream().id())
    }

    /// Whether an engine stream is held
    pub fn is_attached(&self) -> bool {
        self.lease.is_some()
    }
}

impl BusHandler for CallStream {
    fn handle_bus_message(&mut self, message: &EngineMessage) -> BusOutcome {
        let Some(own) = self.stream_id() else {
            return BusOutcome::Unhandled;
        };

        match &message.kind {
            EngineMessageKind::StreamError {
                stream,
                code,
                message: text,
            } if *stream == own => {
                warn!("Error on stream {} ({}): {}", self.path, code, text);
                let failure = BridgeError::EngineStream {
                    message: text.clone(),
                }
                .failure();
                self.peer.fail_content(&self.content_path, &failure);
                self.events.emit(BridgeEvent::ContentFailed {
                    content: self.content_path.clone(),
                    failure,
                });
                BusOutcome::Handled
            }
            EngineMessageKind::RecvCodecsChanged { stream, codecs } if *stream == own => {
                debug!("Stream {} now receives {} codecs", self.path, codecs.len());
                for codec in codecs {
                    debug!("  {}", codec);
                }
                BusOutcome::Handled
            }
            _ => BusOutcome::Unhandled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_channel;
    use crate::testing::{stream_properties, RecordingPeer};

    #[test]
    fn test_properties_give_contact_and_transmitter() {
        let peer = RecordingPeer::new();
        let (events, _stream) = event_channel();
        let mut stream = CallStream::new("/call/c1/s1", "/call/c1", peer.clone(), events);
        stream.start().unwrap();

        let (contact, transmitter) = stream
            .on_properties(Ok(stream_properties(5, 2, SendingState::Sending)))
            .unwrap();
        assert_eq!(contact, 5);
        assert_eq!(transmitter.transmitter, "nice");
        assert!(stream.is_sending());
    }

    #[test]
    fn test_unknown_transport_is_invalid() {
        let peer = RecordingPeer::new();
        let (events, _stream) = event_channel();
        let mut stream = CallStream::new("/call/c1/s1", "/call/c1", peer, events);
        let err = stream
            .on_properties(Ok(stream_properties(5, 0, SendingState::None)))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PROPERTY");
        assert_eq!(stream.contact(), None);
    }

    #[test]
    fn test_pending_send_counts_as_sending() {
        let peer = RecordingPeer::new();
        let (events, _stream) = event_channel();
        let mut stream = CallStream::new("/call/c1/s1", "/call/c1", peer, events);
        stream.set_local_sending_state(SendingState::PendingSend.as_u32());
        assert!(stream.is_sending());
        stream.set_local_sending_state(9);
        assert_eq!(stream.sending_state(), SendingState::PendingSend);
        stream.set_local_sending_state(SendingState::PendingStopSending.as_u32());
        assert!(!stream.is_sending());
    }
}
