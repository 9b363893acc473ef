//! Bridge harness driving one channel against the fake engine and peer

#![allow(dead_code)]

use callbridge::testing::{
    channel_properties, codec_offer, content_properties, fetched, media_properties,
    offer_properties, protocol_codec, stream_properties, video_control_properties, FakeConference,
    FakeEngine, FakeSession, RecordingPeer,
};
use callbridge::{
    Bridge, BridgeConfig, BridgeEvent, BusOutcome, CallContent, ContactHandle, EngineConference,
    EngineMessage, EngineMessageKind, EngineSession, EventStream, MediaType, PeerEvent,
    PeerInterface, PropertyBundle, SendingState,
};
use std::sync::Arc;

pub const CHANNEL: &str = "/call/1";
pub const AUDIO: &str = "/call/1/content/audio";
pub const VIDEO: &str = "/call/1/content/video";

pub struct Harness {
    pub bridge: Bridge,
    pub events: EventStream,
    pub engine: Arc<FakeEngine>,
    pub peer: Arc<RecordingPeer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let engine = FakeEngine::new();
        let peer = RecordingPeer::new();
        let (mut bridge, events) = Bridge::new(engine.clone(), config);
        bridge
            .add_channel(CHANNEL, peer.clone())
            .expect("channel is new");
        Self {
            bridge,
            events,
            engine,
            peer,
        }
    }

    pub fn send(&mut self, event: PeerEvent) {
        self.bridge.handle_peer_event(CHANNEL, event);
    }

    pub fn bus(&mut self, kind: EngineMessageKind) -> BusOutcome {
        let origin = self.conference("rtp").id();
        self.bridge
            .handle_bus_message(&EngineMessage::new(origin, kind))
    }

    pub fn open_channel(&mut self, contents: &[&str]) {
        self.send(fetched(
            CHANNEL,
            PeerInterface::Channel,
            channel_properties(contents, false),
        ));
    }

    pub fn content_props(&mut self, content: &str, media_type: MediaType, streams: &[&str]) {
        let video_control = media_type == MediaType::Video;
        self.send(fetched(
            content,
            PeerInterface::Content,
            content_properties(media_type, streams, video_control),
        ));
    }

    pub fn video_props(&mut self, content: &str, mtu: u32, resolution: (u32, u32)) {
        self.send(fetched(
            content,
            PeerInterface::VideoControl,
            video_control_properties(0, mtu, false, resolution),
        ));
    }

    pub fn media_props(&mut self, content: &str, offer: Option<(&str, ContactHandle)>) {
        let offer = offer.map(|(path, contact)| (path, contact, pcmu_offer()));
        self.send(fetched(
            content,
            PeerInterface::ContentMedia,
            media_properties(0, offer, SendingState::None, 0),
        ));
    }

    pub fn stream_props(&mut self, stream: &str, contact: ContactHandle, sending: SendingState) {
        self.send(fetched(
            stream,
            PeerInterface::Stream,
            stream_properties(contact, 1, sending),
        ));
    }

    pub fn offer(&mut self, content: &str, path: &str, contact: ContactHandle) {
        self.send(PeerEvent::NewMediaDescriptionOffer {
            content: content.to_string(),
            description: path.to_string(),
            contact,
            properties: pcmu_offer(),
        });
    }

    /// Audio content with streams, initialised up to its session
    pub fn ready_audio(&mut self, streams: &[&str], offer: Option<(&str, ContactHandle)>) {
        self.open_channel(&[AUDIO]);
        self.content_props(AUDIO, MediaType::Audio, streams);
        self.media_props(AUDIO, offer);
    }

    pub fn content(&self, path: &str) -> &CallContent {
        self.bridge
            .channel(CHANNEL)
            .and_then(|channel| channel.content(path))
            .expect("content exists")
    }

    pub fn conference(&self, conference_type: &str) -> Arc<FakeConference> {
        self.engine
            .conference(conference_type)
            .expect("conference exists")
    }

    pub fn session(&self) -> Arc<FakeSession> {
        self.engine.last_session().expect("session exists")
    }

    pub fn session_id(&self) -> callbridge::ObjectId {
        self.session().id()
    }

    pub fn drain_events(&mut self) -> Vec<BridgeEvent> {
        self.events.drain()
    }
}

pub fn pcmu_offer() -> PropertyBundle {
    offer_properties(&codec_offer(vec![protocol_codec(0, "PCMU", 8000)]))
}
