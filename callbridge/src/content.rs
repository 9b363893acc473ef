//! Call content: one negotiated media line
//!
//! A content walks through its initialisation as property fetches come
//! back from the peer, then owns the engine session, the stream pool, the
//! negotiation and DTMF state and, for video, the video control adapter.
//! Every peer and engine notification for the content arrives through
//! `&mut self`, so none of that state is locked.

use crate::channel::CallResources;
use crate::config::BridgeConfig;
use crate::event::{BridgeEvent, EventSender};
use crate::negotiator::{
    ApplyOutcome, MediaDescriptionNegotiator, NegotiationContext, NegotiationState, ParsedOffer,
};
use crate::stream::CallStream;
use callbridge_core::{
    BridgeError, BridgeResult, BusDispatcher, BusHandler, BusOutcome, ConferenceLease,
    ContactHandle, EngineConference, EngineMessage, EngineMessageKind, EngineSession,
    EngineStream, MediaType, PacketizationType, SendingState, TransmitterConfig,
};
use callbridge_media::{
    DtmfController, DtmfEffect, SourceOutputIter, StreamLease, StreamPool, VideoControlAdapter,
    VideoNotice,
};
use callbridge_signaling::{
    decode, interface, ContentProperties, MediaProperties, PeerError, PeerEvent, PeerInterface,
    PropertyBundle, SignalKind, SignalingPeer, VideoControlProperties,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const VIDEO_CONTROL_SIGNALS: [SignalKind; 5] = [
    SignalKind::KeyFrameRequested,
    SignalKind::VideoResolutionChanged,
    SignalKind::BitrateChanged,
    SignalKind::FramerateChanged,
    SignalKind::MtuChanged,
];

/// Map a property fetch answer to its bundle
pub(crate) fn fetched_bundle(
    interface: &str,
    result: Result<PropertyBundle, PeerError>,
) -> BridgeResult<PropertyBundle> {
    result.map_err(|e| BridgeError::PropertyFetch {
        interface: interface.to_string(),
        reason: e.to_string(),
    })
}

/// Initialisation progress of a content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPhase {
    /// Not started
    Pending,
    /// Waiting for the content properties
    AwaitingContentProperties,
    /// Waiting for the video control properties
    AwaitingVideoControl,
    /// Waiting for the media properties
    AwaitingMedia,
    /// Session exists
    Ready,
    /// Initialisation failed
    Failed,
    /// Torn down
    Disposed,
}

/// One content of a call channel
#[derive(Debug)]
pub struct CallContent {
    path: String,
    peer: Arc<dyn SignalingPeer>,
    resources: CallResources,
    config: Arc<BridgeConfig>,
    events: EventSender,
    media_type: Option<MediaType>,
    phase: ContentPhase,
    conference: Option<ConferenceLease>,
    session: Option<Arc<dyn EngineSession>>,
    pool: StreamPool,
    streams: BusDispatcher<String, CallStream>,
    outstanding_streams: Vec<String>,
    negotiator: MediaDescriptionNegotiator,
    dtmf: DtmfController,
    video: Option<VideoControlAdapter>,
    got_media_description_property: bool,
}

impl CallContent {
    /// Content at `path`; nothing happens until [`start`](Self::start)
    pub fn new(
        path: impl Into<String>,
        peer: Arc<dyn SignalingPeer>,
        resources: CallResources,
        config: Arc<BridgeConfig>,
        events: EventSender,
    ) -> Self {
        Self {
            path: path.into(),
            peer,
            pool: StreamPool::new(resources.participants.clone()),
            resources,
            dtmf: DtmfController::new(config.dtmf_volume),
            config,
            events,
            media_type: None,
            phase: ContentPhase::Pending,
            conference: None,
            session: None,
            streams: BusDispatcher::new(),
            outstanding_streams: Vec::new(),
            negotiator: MediaDescriptionNegotiator::new(),
            video: None,
            got_media_description_property: false,
        }
    }

    /// Subscribe to stream changes and fetch the content properties
    pub fn start(&mut self) {
        if self.phase != ContentPhase::Pending {
            return;
        }
        if let Err(err) = self.begin() {
            self.init_failed(err);
        }
    }

    fn begin(&mut self) -> BridgeResult<()> {
        self.subscribe(SignalKind::StreamsAdded)?;
        self.subscribe(SignalKind::StreamsRemoved)?;
        self.phase = ContentPhase::AwaitingContentProperties;
        self.peer.fetch_properties(&self.path, PeerInterface::Content);
        Ok(())
    }

    fn subscribe(&self, signal: SignalKind) -> BridgeResult<()> {
        self.peer
            .subscribe(&self.path, signal)
            .map_err(|e| BridgeError::SignalSubscription {
                signal: signal.to_string(),
                reason: e.to_string(),
            })
    }

    /// Handle a peer notification addressed to this content or one of its streams
    pub fn handle_peer_event(&mut self, event: PeerEvent) {
        if matches!(self.phase, ContentPhase::Disposed | ContentPhase::Failed) {
            debug!("Ignoring {} on content {}", event.event_type(), self.path);
            return;
        }

        match event {
            PeerEvent::PropertiesFetched {
                object_path,
                interface,
                result,
            } => {
                if object_path != self.path {
                    self.on_stream_properties(&object_path, result);
                    return;
                }
                match (interface, self.phase) {
                    (PeerInterface::Content, ContentPhase::AwaitingContentProperties) => {
                        let outcome = self.read_content_properties(result);
                        self.finish_init_step(outcome);
                    }
                    (PeerInterface::VideoControl, ContentPhase::AwaitingVideoControl) => {
                        let outcome = self.read_video_control_properties(result);
                        self.finish_init_step(outcome);
                    }
                    (PeerInterface::ContentMedia, ContentPhase::AwaitingMedia) => {
                        let outcome = self.read_media_properties(result);
                        self.finish_init_step(outcome);
                    }
                    (interface, phase) => debug!(
                        "Ignoring {} properties on {} in phase {:?}",
                        interface.name(),
                        self.path,
                        phase
                    ),
                }
            }
            PeerEvent::StreamsAdded { streams, .. } => {
                for stream in streams {
                    self.add_stream(stream);
                }
            }
            PeerEvent::StreamsRemoved { streams, .. } => {
                for stream in streams {
                    self.remove_stream(&stream);
                }
            }
            PeerEvent::NewMediaDescriptionOffer {
                description,
                contact,
                properties,
                ..
            } => {
                if !self.got_media_description_property {
                    debug!("Ignoring offer {} before the media properties", description);
                    return;
                }
                self.process_offer(&description, contact, &properties);
            }
            PeerEvent::DtmfChangeRequested { event, state, .. } => {
                let effects = self.dtmf.request_change(self.session.as_ref(), event, state);
                self.apply_dtmf_effects(effects);
            }
            PeerEvent::KeyFrameRequested { .. } => {
                if let Some(video) = &self.video {
                    video.request_keyframe(self.session.as_ref());
                }
            }
            PeerEvent::VideoResolutionChanged { resolution, .. } => {
                if let Some(video) = &mut self.video {
                    let notices = video.set_resolution(resolution.width, resolution.height);
                    self.emit_video_notices(notices);
                }
            }
            PeerEvent::BitrateChanged { bitrate, .. } => {
                if let Some(video) = &mut self.video {
                    video.set_bitrate(bitrate, self.session.as_ref());
                }
            }
            PeerEvent::FramerateChanged { framerate, .. } => {
                if let Some(video) = &mut self.video {
                    let notices = video.set_framerate(framerate);
                    self.emit_video_notices(notices);
                }
            }
            PeerEvent::MtuChanged { mtu, .. } => {
                if let Some(video) = &mut self.video {
                    video.set_mtu(mtu);
                }
            }
            PeerEvent::LocalSendingStateChanged { stream, state } => {
                let was_sending = self.sending_count() > 0;
                match self.streams.get_mut(&stream) {
                    Some(call_stream) => call_stream.set_local_sending_state(state),
                    None => return,
                }
                self.sending_changed(was_sending);
            }
            other => debug!("Content {} ignores {}", self.path, other.event_type()),
        }
    }

    fn finish_init_step(&mut self, outcome: BridgeResult<()>) {
        if let Err(err) = outcome {
            self.init_failed(err);
        }
    }

    fn read_content_properties(
        &mut self,
        result: Result<PropertyBundle, PeerError>,
    ) -> BridgeResult<()> {
        let bundle = fetched_bundle(interface::CONTENT, result)?;
        let props: ContentProperties = decode(interface::CONTENT, &bundle)?;

        if !props.interfaces.iter().any(|i| i == interface::CONTENT_MEDIA) {
            return Err(BridgeError::InvalidProperty {
                interface: interface::CONTENT.to_string(),
                reason: "Content does not have the media interface".to_string(),
            });
        }
        let media_type = MediaType::from_protocol(props.media_type).ok_or_else(|| {
            BridgeError::InvalidProperty {
                interface: interface::CONTENT.to_string(),
                reason: format!("unknown media type {}", props.media_type),
            }
        })?;
        self.media_type = Some(media_type);

        for stream in props.streams {
            self.add_stream(stream);
        }

        self.subscribe(SignalKind::NewMediaDescriptionOffer)?;

        if props.interfaces.iter().any(|i| i == interface::VIDEO_CONTROL) {
            for signal in VIDEO_CONTROL_SIGNALS {
                self.subscribe(signal)?;
            }
            self.video = Some(VideoControlAdapter::new());
            self.phase = ContentPhase::AwaitingVideoControl;
            self.peer
                .fetch_properties(&self.path, PeerInterface::VideoControl);
            return Ok(());
        }

        self.request_media_properties()
    }

    fn read_video_control_properties(
        &mut self,
        result: Result<PropertyBundle, PeerError>,
    ) -> BridgeResult<()> {
        let bundle = fetched_bundle(interface::VIDEO_CONTROL, result)?;
        let props: VideoControlProperties = decode(interface::VIDEO_CONTROL, &bundle)?;

        let video = self.video.get_or_insert_with(VideoControlAdapter::new);
        let notices = video.apply_initial(
            props.bitrate,
            props.mtu,
            props.manual_key_frames,
            props.video_resolution.width,
            props.video_resolution.height,
        );
        self.emit_video_notices(notices);

        self.request_media_properties()
    }

    fn request_media_properties(&mut self) -> BridgeResult<()> {
        self.subscribe(SignalKind::DtmfChangeRequested)?;
        self.phase = ContentPhase::AwaitingMedia;
        self.peer
            .fetch_properties(&self.path, PeerInterface::ContentMedia);
        Ok(())
    }

    fn read_media_properties(&mut self, result: Result<PropertyBundle, PeerError>) -> BridgeResult<()> {
        let bundle = fetched_bundle(interface::CONTENT_MEDIA, result)?;
        let props: MediaProperties = decode(interface::CONTENT_MEDIA, &bundle)?;

        let media_type = self.media_type.ok_or_else(|| BridgeError::InvalidState {
            expected: "media type".to_string(),
            actual: "none".to_string(),
        })?;
        let packetization = PacketizationType::from_protocol(props.packetization).ok_or(
            BridgeError::UnsupportedPacketization {
                packetization: props.packetization,
            },
        )?;

        let lease = self
            .resources
            .conferences
            .lock()
            .acquire(self.resources.engine.as_ref(), packetization.conference_type())?;
        let conference = lease.conference().clone();
        let session = match conference.new_session(media_type) {
            Ok(session) => session,
            Err(e) => {
                self.resources.conferences.lock().release(lease);
                return Err(BridgeError::SessionCreation {
                    reason: e.to_string(),
                });
            }
        };
        info!(
            "Content {} has {} session {} on conference {}",
            self.path,
            media_type,
            session.id(),
            conference.id()
        );

        self.conference = Some(lease);
        self.session = Some(session.clone());
        if let Some(video) = &mut self.video {
            video.attach(&conference);
            video.on_session_created(&session);
        }
        self.negotiator.session_ready(media_type);

        for stream in std::mem::take(&mut self.outstanding_streams) {
            self.create_stream(stream);
        }

        if self.config.apply_default_codec_preferences {
            let preferences = conference.default_codec_preferences(media_type);
            if let Err(e) = session.set_codec_preferences(&preferences) {
                warn!("Could not set codec preferences on {}: {}", self.path, e);
            }
        }

        self.phase = ContentPhase::Ready;
        self.events.emit(BridgeEvent::ContentReady {
            content: self.path.clone(),
            media_type,
        });

        let offer = &props.media_description_offer;
        if offer.is_present() {
            self.process_offer(offer.path(), offer.contact(), offer.properties());
        }
        self.got_media_description_property = true;

        // The snapshot reports an idle tone as None, which is not a request.
        let idle = props.current_dtmf_state == SendingState::None.as_u32();
        if !(idle && self.dtmf.is_armed()) {
            let effects = self.dtmf.request_change(
                Some(&session),
                props.current_dtmf_event,
                props.current_dtmf_state,
            );
            self.apply_dtmf_effects(effects);
        }
        Ok(())
    }

    fn process_offer(&mut self, path: &str, contact: ContactHandle, properties: &PropertyBundle) {
        let offer = match self
            .negotiator
            .receive_offer(self.peer.as_ref(), path, contact, properties)
        {
            Ok(offer) => offer,
            Err(err) => {
                self.fail(err);
                return;
            }
        };

        match self.pool.lookup(contact) {
            Some(stream) => self.apply_offer(&stream, offer),
            None => self.negotiator.park(offer),
        }
    }

    fn apply_offer(&mut self, stream: &Arc<dyn EngineStream>, offer: ParsedOffer) {
        match self.negotiator.apply_to_stream(self.peer.as_ref(), stream, offer) {
            ApplyOutcome::Applied {
                first_remote_codecs,
            } => {
                if first_remote_codecs {
                    if let Some(session) = self.session.clone() {
                        let effects = self.dtmf.arm(&session);
                        self.apply_dtmf_effects(effects);
                    }
                }
                self.try_sending_local_codecs();
            }
            ApplyOutcome::Rejected { reason } => {
                debug!("Offer on {} rejected: {}", self.path, reason);
            }
        }
    }

    fn try_sending_local_codecs(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let local_sending = self.sending_count() > 0;
        let ctx = NegotiationContext {
            peer: self.peer.as_ref(),
            content: &self.path,
            session: &session,
            local_sending,
            default_reporting_interval: self.config.default_reporting_interval_ms,
        };
        let outcome = self.negotiator.try_sending_local_codecs(&ctx);
        debug!("Local codecs of {}: {:?}", self.path, outcome);
    }

    fn sending_changed(&mut self, was_sending: bool) {
        if was_sending != (self.sending_count() > 0) {
            self.try_sending_local_codecs();
        }
    }

    fn add_stream(&mut self, path: String) {
        if self.streams.contains(&path) || self.outstanding_streams.contains(&path) {
            return;
        }
        if self.session.is_none() {
            debug!("Queueing stream {} until the conference exists", path);
            self.outstanding_streams.push(path);
            return;
        }
        self.create_stream(path);
    }

    fn create_stream(&mut self, path: String) {
        let mut stream = CallStream::new(
            path.clone(),
            self.path.clone(),
            self.peer.clone(),
            self.events.clone(),
        );
        if let Err(err) = stream.start() {
            self.fail(err);
            return;
        }
        self.streams.insert(path, stream);
    }

    fn remove_stream(&mut self, path: &str) {
        let key = path.to_string();
        self.outstanding_streams.retain(|p| *p != key);
        if let Some(mut stream) = self.streams.remove(&key) {
            debug!("Removing stream {} from {}", path, self.path);
            stream.release(&self.pool);
        }
    }

    fn on_stream_properties(&mut self, path: &str, result: Result<PropertyBundle, PeerError>) {
        let key = path.to_string();
        let was_sending = self.sending_count() > 0;
        let Some(stream) = self.streams.get_mut(&key) else {
            debug!("No stream {} on {}", path, self.path);
            return;
        };
        if stream.is_attached() {
            return;
        }

        let (contact, transmitter) = match stream.on_properties(result) {
            Ok(found) => found,
            Err(err) => {
                self.fail(err);
                return;
            }
        };

        match self.acquire_stream(contact, &transmitter) {
            Ok(lease) => {
                if let Some(stream) = self.streams.get_mut(&key) {
                    stream.attach(lease);
                } else {
                    self.pool.put(lease);
                }
            }
            Err(err) => {
                self.fail(err);
                return;
            }
        }
        self.sending_changed(was_sending);
    }

    fn acquire_stream(
        &mut self,
        contact: ContactHandle,
        transmitter: &TransmitterConfig,
    ) -> BridgeResult<StreamLease> {
        let (Some(session), Some(conference)) = (self.session.clone(), self.conference_object())
        else {
            return Err(BridgeError::InvalidState {
                expected: "session".to_string(),
                actual: "none".to_string(),
            });
        };

        let (lease, created) = self
            .pool
            .get_or_create(&session, &conference, contact, transmitter)?;
        if created {
            if let Some(offer) = self.negotiator.take_pending_for(contact) {
                let stream = lease.stream().clone();
                self.apply_offer(&stream, offer);
            }
        }
        Ok(lease)
    }

    fn apply_dtmf_effects(&mut self, effects: Vec<DtmfEffect>) {
        for effect in effects {
            match effect {
                DtmfEffect::Acknowledge { event, state } => {
                    self.peer.acknowledge_dtmf_change(&self.path, event, state);
                }
                DtmfEffect::Fail(err) => self.fail(err.into()),
            }
        }
    }

    fn emit_video_notices(&self, notices: Vec<VideoNotice>) {
        for notice in notices {
            let content = self.path.clone();
            let event = match notice {
                VideoNotice::ResolutionChanged { width, height } => BridgeEvent::ResolutionChanged {
                    content,
                    width,
                    height,
                },
                VideoNotice::FramerateChanged { framerate } => {
                    BridgeEvent::FramerateChanged { content, framerate }
                }
                VideoNotice::RestartSource => BridgeEvent::RestartSource { content },
            };
            self.events.emit(event);
        }
    }

    fn init_failed(&mut self, err: BridgeError) {
        self.phase = ContentPhase::Failed;
        let error_code = err.error_code();
        let message = err.to_string();
        self.fail(err);
        self.events.emit(BridgeEvent::ContentInitFailed {
            content: self.path.clone(),
            error_code,
            message,
        });
    }

    /// Report a fatal error for this content to the peer
    pub fn fail(&self, err: BridgeError) {
        warn!("Content {} failed: {}", self.path, err);
        let failure = err.failure();
        self.peer.fail_content(&self.path, &failure);
        self.events.emit(BridgeEvent::ContentFailed {
            content: self.path.clone(),
            failure,
        });
    }

    /// Release streams, session and conference
    pub fn dispose(&mut self) {
        if self.phase == ContentPhase::Disposed {
            return;
        }
        self.phase = ContentPhase::Disposed;
        debug!("Disposing content {}", self.path);

        for (_, mut stream) in self.streams.drain() {
            stream.release(&self.pool);
        }
        self.outstanding_streams.clear();

        if let Some(session) = self.session.take() {
            session.dispose();
        }
        self.pool.dispose();

        if let Some(video) = &mut self.video {
            video.detach();
        }
        if let Some(lease) = self.conference.take() {
            self.resources.conferences.lock().release(lease);
        }
        self.negotiator.dispose();
    }

    fn conference_object(&self) -> Option<Arc<dyn EngineConference>> {
        self.conference.as_ref().map(|lease| lease.conference().clone())
    }

    /// Object path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Media type once the content properties arrived
    pub fn media_type(&self) -> Option<MediaType> {
        self.media_type
    }

    /// Initialisation progress
    pub fn phase(&self) -> ContentPhase {
        self.phase
    }

    /// Engine session
    pub fn session(&self) -> Option<&Arc<dyn EngineSession>> {
        self.session.as_ref()
    }

    /// Engine conference
    pub fn conference(&self) -> Option<Arc<dyn EngineConference>> {
        self.conference_object()
    }

    /// Requested framerate, 0 when unknown or not video
    pub fn framerate(&self) -> u32 {
        self.video.as_ref().map_or(0, |v| v.framerate())
    }

    /// Requested width, 0 when unknown or not video
    pub fn width(&self) -> u32 {
        self.video.as_ref().map_or(0, |v| v.resolution().0)
    }

    /// Requested height, 0 when unknown or not video
    pub fn height(&self) -> u32 {
        self.video.as_ref().map_or(0, |v| v.resolution().1)
    }

    /// Video control state, for video contents
    pub fn video(&self) -> Option<&VideoControlAdapter> {
        self.video.as_ref()
    }

    /// Negotiation progress
    pub fn negotiation_state(&self) -> NegotiationState {
        self.negotiator.state()
    }

    /// Current DTMF state
    pub fn dtmf_state(&self) -> SendingState {
        self.dtmf.state()
    }

    /// Number of streams currently sending
    pub fn sending_count(&self) -> usize {
        self.streams.values().filter(|s| s.is_sending()).count()
    }

    /// Whether this content owns the stream at `path`
    pub fn owns_stream(&self, path: &str) -> bool {
        let key = path.to_string();
        self.streams.contains(&key) || self.outstanding_streams.contains(&key)
    }

    /// Paths of created streams, in creation order
    pub fn stream_paths(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    /// Paths of streams waiting for the conference
    pub fn outstanding_streams(&self) -> &[String] {
        &self.outstanding_streams
    }

    /// Engine streams of this content
    pub fn pool(&self) -> &StreamPool {
        &self.pool
    }

    /// Decoded outputs of the streams for `handles`
    pub fn iterate_src_outputs(&self, handles: &[ContactHandle]) -> SourceOutputIter {
        self.pool.iterate_src_outputs(handles)
    }
}

impl BusHandler for CallContent {
    fn handle_bus_message(&mut self, message: &EngineMessage) -> BusOutcome {
        if self.phase == ContentPhase::Disposed {
            return BusOutcome::Unhandled;
        }
        let Some(own) = self.session.as_ref().map(|s| s.id()) else {
            return BusOutcome::Unhandled;
        };

        match &message.kind {
            EngineMessageKind::SessionError {
                session,
                code,
                message: text,
            } if *session == own => {
                warn!("Error on session of {} ({}): {}", self.path, code, text);
                self.fail(BridgeError::EngineSession {
                    message: text.clone(),
                });
                return BusOutcome::Handled;
            }
            EngineMessageKind::CodecsChanged { session } if *session == own => {
                debug!("Codecs changed on {}", self.path);
                self.try_sending_local_codecs();
                return BusOutcome::Handled;
            }
            EngineMessageKind::TelephonyEventStarted {
                session,
                event,
                volume,
                ..
            } if *session == own => {
                let effects = self.dtmf.on_engine_started(*event, *volume);
                self.apply_dtmf_effects(effects);
                return BusOutcome::Handled;
            }
            EngineMessageKind::TelephonyEventStopped { session, .. } if *session == own => {
                let effects = self.dtmf.on_engine_stopped();
                self.apply_dtmf_effects(effects);
                return BusOutcome::Handled;
            }
            EngineMessageKind::SendCodecChanged {
                session,
                codec,
                secondary_codecs,
            } if *session == own => {
                debug!("Send codec changed on {}: {}", self.path, codec);
                for (i, secondary) in secondary_codecs.iter().enumerate() {
                    debug!("Secondary send codec {} changed: {}", i, secondary);
                }
            }
            EngineMessageKind::SourceOutputAdded { stream, output } => {
                if let Some(handle) = self.pool.handle_for_stream(*stream) {
                    self.events.emit(BridgeEvent::SourceOutputAdded {
                        content: self.path.clone(),
                        handle,
                        stream: *stream,
                        output: output.clone(),
                    });
                    return BusOutcome::Handled;
                }
            }
            _ => {}
        }

        self.streams.dispatch(message)
    }
}

impl Drop for CallContent {
    fn drop(&mut self) {
        self.dispose();
    }
}
