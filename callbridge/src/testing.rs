//! In-memory engine and peer for driving the bridge in tests
//!
//! [`FakeEngine`] builds conferences, sessions and streams that record what
//! the bridge asked of them and fail on demand through [`EngineKnobs`].
//! [`RecordingPeer`] logs every outbound peer call. The bundle builders
//! produce the property maps the peer would deliver.

use callbridge_core::{
    CallStateChangeReason, Codec, CodecListKind, ContactHandle, ContentFailure, Direction,
    ElementAddedHook, ElementParameter, EngineConference, EngineElement, EngineError,
    EngineParticipant, EngineResult, EngineSession, EngineStream, MediaEngine, MediaType,
    ObjectId, RtpHeaderExtension, SendingState, SourceOutput, TransmitterConfig,
};
use callbridge_signaling::{
    interface, MediaDescription, MediaDescriptionProxy, PeerError, PeerEvent, PeerInterface,
    PropertyBundle, ProtocolCodec, SignalKind, SignalingPeer,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// CODECS
// ============================================================================

/// G.711 µ-law
pub fn pcmu() -> Codec {
    Codec::new(0, "PCMU", MediaType::Audio, 8000).with_channels(1)
}

/// Telephone events
pub fn telephone_event() -> Codec {
    Codec::new(101, "telephone-event", MediaType::Audio, 8000).with_channels(1)
}

/// VP8 video
pub fn vp8() -> Codec {
    Codec::new(96, "VP8", MediaType::Video, 90000)
}

/// Protocol codec record
pub fn protocol_codec(identifier: u32, name: &str, clock_rate: u32) -> ProtocolCodec {
    ProtocolCodec {
        identifier,
        name: name.to_string(),
        clock_rate,
        channels: 1,
        updated: false,
        parameters: BTreeMap::new(),
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Behaviour switches shared by every object of one [`FakeEngine`]
#[derive(Debug)]
pub struct EngineKnobs {
    /// Codecs reported before configuration is known
    pub local_codecs: Mutex<Option<Vec<Codec>>>,
    /// Fully configured codecs; falls back to `local_codecs` when unset
    pub full_codecs: Mutex<Option<Vec<Codec>>>,
    /// Codecs reported as needing a resend
    pub resend: Mutex<Vec<Codec>>,
    /// Default codec preferences of new conferences
    pub default_preferences: Mutex<Vec<Codec>>,
    /// Header extensions supported by sessions
    pub session_header_extensions: Mutex<Vec<RtpHeaderExtension>>,
    /// Refuse to create conferences
    pub fail_conference: AtomicBool,
    /// Refuse to create sessions
    pub fail_session: AtomicBool,
    /// Refuse remote codecs
    pub fail_remote_codecs: AtomicBool,
    /// Refuse telephony events
    pub fail_telephony: AtomicBool,
    /// Refuse codec preferences
    pub fail_preferences: AtomicBool,
    /// Streams expose header extensions
    pub streams_support_header_extensions: AtomicBool,
}

impl Default for EngineKnobs {
    fn default() -> Self {
        Self {
            local_codecs: Mutex::new(Some(vec![pcmu()])),
            full_codecs: Mutex::new(None),
            resend: Mutex::new(Vec::new()),
            default_preferences: Mutex::new(Vec::new()),
            session_header_extensions: Mutex::new(Vec::new()),
            fail_conference: AtomicBool::new(false),
            fail_session: AtomicBool::new(false),
            fail_remote_codecs: AtomicBool::new(false),
            fail_telephony: AtomicBool::new(false),
            fail_preferences: AtomicBool::new(false),
            streams_support_header_extensions: AtomicBool::new(true),
        }
    }
}

impl EngineKnobs {
    /// Replace the codecs reported before configuration
    pub fn set_local_codecs(&self, codecs: Option<Vec<Codec>>) {
        *self.local_codecs.lock() = codecs;
    }

    /// Replace the codecs reported as needing a resend
    pub fn set_resend(&self, codecs: Vec<Codec>) {
        *self.resend.lock() = codecs;
    }
}

fn refused(object: &str) -> EngineError {
    EngineError::Construction {
        object: object.to_string(),
        reason: "refused by test".to_string(),
    }
}

/// Media engine double
#[derive(Debug, Default)]
pub struct FakeEngine {
    knobs: Arc<EngineKnobs>,
    conferences: Mutex<Vec<Arc<FakeConference>>>,
}

impl FakeEngine {
    /// Engine with default knobs
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Shared behaviour switches
    pub fn knobs(&self) -> &Arc<EngineKnobs> {
        &self.knobs
    }

    /// Every conference created so far, oldest first
    pub fn conferences(&self) -> Vec<Arc<FakeConference>> {
        self.conferences.lock().clone()
    }

    /// Most recent conference of `conference_type`
    pub fn conference(&self, conference_type: &str) -> Option<Arc<FakeConference>> {
        self.conferences
            .lock()
            .iter()
            .rev()
            .find(|c| c.conference_type == conference_type)
            .cloned()
    }

    /// Most recent session of any conference
    pub fn last_session(&self) -> Option<Arc<FakeSession>> {
        self.conferences
            .lock()
            .iter()
            .flat_map(|c| c.sessions.lock().clone())
            .max_by_key(|s| s.id)
    }
}

impl MediaEngine for FakeEngine {
    fn create_conference(&self, conference_type: &str) -> EngineResult<Arc<dyn EngineConference>> {
        if self.knobs.fail_conference.load(Ordering::SeqCst) {
            return Err(EngineError::UnsupportedConference {
                conference_type: conference_type.to_string(),
            });
        }
        let conference = Arc::new(FakeConference {
            id: ObjectId::next(),
            conference_type: conference_type.to_string(),
            knobs: self.knobs.clone(),
            hooks: Mutex::new(Vec::new()),
            elements: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            participants: AtomicUsize::new(0),
        });
        self.conferences.lock().push(conference.clone());
        Ok(conference)
    }
}

/// Conference double
#[derive(Debug)]
pub struct FakeConference {
    id: ObjectId,
    conference_type: String,
    knobs: Arc<EngineKnobs>,
    hooks: Mutex<Vec<Arc<dyn ElementAddedHook>>>,
    elements: Mutex<Vec<Arc<FakeElement>>>,
    /// Sessions created on this conference
    pub sessions: Mutex<Vec<Arc<FakeSession>>>,
    /// Number of participants created
    pub participants: AtomicUsize,
}

impl FakeConference {
    /// Instantiate an element and show it to every hook
    pub fn add_element(&self, element: Arc<FakeElement>) {
        let hooks = self.hooks.lock().clone();
        for hook in hooks {
            hook.element_added(element.as_ref());
        }
        self.elements.lock().push(element);
    }

    /// Number of installed element hooks
    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }
}

impl EngineConference for FakeConference {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn conference_type(&self) -> String {
        self.conference_type.clone()
    }

    fn new_session(&self, media_type: MediaType) -> EngineResult<Arc<dyn EngineSession>> {
        if self.knobs.fail_session.load(Ordering::SeqCst) {
            return Err(refused("session"));
        }
        let session = FakeSession::with_knobs(media_type, self.knobs.clone());
        self.sessions.lock().push(session.clone());
        Ok(session)
    }

    fn new_participant(&self) -> EngineResult<Arc<dyn EngineParticipant>> {
        self.participants.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeParticipant {
            id: ObjectId::next(),
        }))
    }

    fn default_codec_preferences(&self, _media_type: MediaType) -> Vec<Codec> {
        self.knobs.default_preferences.lock().clone()
    }

    fn add_element_hook(&self, hook: Arc<dyn ElementAddedHook>) {
        let elements = self.elements.lock().clone();
        for element in elements {
            hook.element_added(element.as_ref());
        }
        self.hooks.lock().push(hook);
    }

    fn remove_element_hook(&self, hook: &Arc<dyn ElementAddedHook>) {
        self.hooks
            .lock()
            .retain(|h| Arc::as_ptr(h) as *const () != Arc::as_ptr(hook) as *const ());
    }
}

/// Participant double
#[derive(Debug)]
pub struct FakeParticipant {
    id: ObjectId,
}

impl EngineParticipant for FakeParticipant {
    fn id(&self) -> ObjectId {
        self.id
    }
}

/// Element double exposing a chosen set of parameters
#[derive(Debug, Default)]
pub struct FakeElement {
    name: String,
    supported: Vec<ElementParameter>,
    values: Mutex<HashMap<ElementParameter, i64>>,
}

impl FakeElement {
    /// Element named `name` that has `supported`
    pub fn new(name: &str, supported: &[ElementParameter]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            supported: supported.to_vec(),
            values: Mutex::new(HashMap::new()),
        })
    }

    /// Value set on `parameter`, if any
    pub fn value(&self, parameter: ElementParameter) -> Option<i64> {
        self.values.lock().get(&parameter).copied()
    }
}

impl EngineElement for FakeElement {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_parameter(&self, parameter: ElementParameter, value: i64) -> Option<()> {
        if !self.supported.contains(&parameter) {
            return None;
        }
        self.values.lock().insert(parameter, value);
        Some(())
    }
}

/// Session double
#[derive(Debug)]
pub struct FakeSession {
    id: ObjectId,
    media_type: MediaType,
    knobs: Arc<EngineKnobs>,
    /// Streams created on this session
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
    /// Telephony commands, as `start <event> <volume>` or `stop`
    pub telephony: Mutex<Vec<String>>,
    /// Last bitrate set
    pub bitrate: Mutex<Option<u32>>,
    /// Keyframe requests
    pub keyframes: AtomicUsize,
    /// Codec preferences set
    pub preferences: Mutex<Option<Vec<Codec>>>,
    /// Whether the session was disposed
    pub disposed: AtomicBool,
}

impl FakeSession {
    fn with_knobs(media_type: MediaType, knobs: Arc<EngineKnobs>) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            media_type,
            knobs,
            streams: Mutex::new(Vec::new()),
            telephony: Mutex::new(Vec::new()),
            bitrate: Mutex::new(None),
            keyframes: AtomicUsize::new(0),
            preferences: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Audio session outside any conference
    pub fn standalone() -> Arc<Self> {
        Self::with_knobs(MediaType::Audio, Arc::new(EngineKnobs::default()))
    }

    /// Create a stream towards a new participant, as the stream pool would
    pub fn create_stream(&self, _contact: ContactHandle) -> Arc<dyn EngineStream> {
        self.spawn_stream(ObjectId::next())
    }

    fn spawn_stream(&self, participant: ObjectId) -> Arc<FakeStream> {
        let header_extensions = self
            .knobs
            .streams_support_header_extensions
            .load(Ordering::SeqCst)
            .then(Vec::new);
        let stream = Arc::new(FakeStream {
            id: ObjectId::next(),
            participant,
            knobs: self.knobs.clone(),
            remote_codecs: Mutex::new(Vec::new()),
            header_extensions: Mutex::new(header_extensions),
            transmitter: Mutex::new(None),
            outputs: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        });
        self.streams.lock().push(stream.clone());
        stream
    }

    /// Media type of the session
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Stream by engine identity
    pub fn stream(&self, id: ObjectId) -> Option<Arc<FakeStream>> {
        self.streams.lock().iter().find(|s| s.id == id).cloned()
    }

    /// Streams not yet disposed
    pub fn live_streams(&self) -> usize {
        self.streams
            .lock()
            .iter()
            .filter(|s| !s.disposed.load(Ordering::SeqCst))
            .count()
    }
}

impl EngineSession for FakeSession {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn new_stream(
        &self,
        participant: &Arc<dyn EngineParticipant>,
        _direction: Direction,
    ) -> EngineResult<Arc<dyn EngineStream>> {
        Ok(self.spawn_stream(participant.id()))
    }

    fn set_codec_preferences(&self, codecs: &[Codec]) -> EngineResult<()> {
        if self.knobs.fail_preferences.load(Ordering::SeqCst) {
            return Err(EngineError::Negotiation {
                reason: "preferences refused".to_string(),
            });
        }
        *self.preferences.lock() = Some(codecs.to_vec());
        Ok(())
    }

    fn codecs(&self, kind: CodecListKind) -> Option<Vec<Codec>> {
        let local = self.knobs.local_codecs.lock().clone();
        match kind {
            CodecListKind::WithoutConfig => local,
            CodecListKind::Full => self.knobs.full_codecs.lock().clone().or(local),
        }
    }

    fn codecs_need_resend(&self, _old: &[Codec], _new: &[Codec]) -> Vec<Codec> {
        self.knobs.resend.lock().clone()
    }

    fn rtp_header_extensions(&self) -> Vec<RtpHeaderExtension> {
        self.knobs.session_header_extensions.lock().clone()
    }

    fn start_telephony_event(&self, event: u8, volume: u8) -> EngineResult<()> {
        if self.knobs.fail_telephony.load(Ordering::SeqCst) {
            return Err(EngineError::TelephonyEvent {
                reason: "no telephone-event codec".to_string(),
            });
        }
        self.telephony
            .lock()
            .push(format!("start {} {}", event, volume));
        Ok(())
    }

    fn stop_telephony_event(&self) -> EngineResult<()> {
        if self.knobs.fail_telephony.load(Ordering::SeqCst) {
            return Err(EngineError::TelephonyEvent {
                reason: "nothing playing".to_string(),
            });
        }
        self.telephony.lock().push("stop".to_string());
        Ok(())
    }

    fn set_send_bitrate(&self, bitrate: u32) {
        *self.bitrate.lock() = Some(bitrate);
    }

    fn request_keyframe(&self) -> EngineResult<()> {
        self.keyframes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// Stream double
#[derive(Debug)]
pub struct FakeStream {
    id: ObjectId,
    participant: ObjectId,
    knobs: Arc<EngineKnobs>,
    /// Every remote codec list applied
    pub remote_codecs: Mutex<Vec<Vec<Codec>>>,
    /// Active header extensions; `None` when unsupported
    pub header_extensions: Mutex<Option<Vec<RtpHeaderExtension>>>,
    /// Transmitter configured
    pub transmitter: Mutex<Option<TransmitterConfig>>,
    /// Decoded outputs
    pub outputs: Mutex<Vec<SourceOutput>>,
    /// Whether the stream was disposed
    pub disposed: AtomicBool,
}

impl FakeStream {
    /// Engine identity
    pub fn object_id(&self) -> ObjectId {
        self.id
    }
}

impl EngineStream for FakeStream {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn participant(&self) -> ObjectId {
        self.participant
    }

    fn set_transmitter(&self, config: &TransmitterConfig) -> EngineResult<()> {
        *self.transmitter.lock() = Some(config.clone());
        Ok(())
    }

    fn rtp_header_extensions(&self) -> Option<Vec<RtpHeaderExtension>> {
        self.header_extensions.lock().clone()
    }

    fn set_rtp_header_extensions(&self, extensions: Vec<RtpHeaderExtension>) {
        let mut current = self.header_extensions.lock();
        if current.is_some() {
            *current = Some(extensions);
        }
    }

    fn set_remote_codecs(&self, codecs: &[Codec]) -> EngineResult<()> {
        if self.knobs.fail_remote_codecs.load(Ordering::SeqCst) {
            return Err(EngineError::Negotiation {
                reason: "no common codec".to_string(),
            });
        }
        self.remote_codecs.lock().push(codecs.to_vec());
        Ok(())
    }

    fn src_outputs(&self) -> Vec<SourceOutput> {
        self.outputs.lock().clone()
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// PEER
// ============================================================================

/// Outbound call made on a [`RecordingPeer`]
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCall {
    /// Property fetch
    Fetch {
        /// Object path
        path: String,
        /// Interface
        interface: PeerInterface,
    },
    /// Signal subscription
    Subscribe {
        /// Object path
        path: String,
        /// Signal
        signal: SignalKind,
    },
    /// Offer accepted
    Accept {
        /// Offer path
        offer: String,
        /// Local answer
        description: MediaDescription,
    },
    /// Offer rejected
    Reject {
        /// Offer path
        offer: String,
    },
    /// Unsolicited local description
    UpdateLocal {
        /// Content path
        content: String,
        /// Contact
        contact: ContactHandle,
        /// Local description
        description: MediaDescription,
    },
    /// DTMF state acknowledged
    AcknowledgeDtmf {
        /// Content path
        content: String,
        /// Event code
        event: u8,
        /// State
        state: SendingState,
    },
    /// Content failed
    Fail {
        /// Content path
        content: String,
        /// Failure
        failure: ContentFailure,
    },
    /// Channel hung up
    Hangup {
        /// Channel path
        channel: String,
        /// Reason
        reason: CallStateChangeReason,
        /// Detailed reason
        detailed_reason: String,
        /// Message
        message: String,
    },
}

/// Peer double recording every call
#[derive(Debug, Default)]
pub struct RecordingPeer {
    calls: Mutex<Vec<PeerCall>>,
    live_proxies: Arc<AtomicUsize>,
    failing_signals: Mutex<Vec<SignalKind>>,
}

impl RecordingPeer {
    /// Peer with nothing recorded
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subscriptions to `signal` fail
    pub fn fail_subscription(&self, signal: SignalKind) {
        self.failing_signals.lock().push(signal);
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().clone()
    }

    /// Every call so far, clearing the log
    pub fn take_calls(&self) -> Vec<PeerCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Media description proxies still alive
    pub fn live_proxies(&self) -> usize {
        self.live_proxies.load(Ordering::SeqCst)
    }

    /// Whether `interface` of `path` was fetched
    pub fn fetched(&self, path: &str, interface: PeerInterface) -> bool {
        self.calls.lock().iter().any(|c| {
            matches!(c, PeerCall::Fetch { path: p, interface: i } if p == path && *i == interface)
        })
    }

    /// Accepted offers with their answers
    pub fn accepts(&self) -> Vec<(String, MediaDescription)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PeerCall::Accept { offer, description } => {
                    Some((offer.clone(), description.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Rejected offers
    pub fn rejects(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PeerCall::Reject { offer } => Some(offer.clone()),
                _ => None,
            })
            .collect()
    }

    /// Unsolicited local descriptions
    pub fn updates(&self) -> Vec<MediaDescription> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PeerCall::UpdateLocal { description, .. } => Some(description.clone()),
                _ => None,
            })
            .collect()
    }

    /// DTMF acknowledgements as (event, state)
    pub fn acknowledgements(&self) -> Vec<(u8, SendingState)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PeerCall::AcknowledgeDtmf { event, state, .. } => Some((*event, *state)),
                _ => None,
            })
            .collect()
    }

    /// Content failures
    pub fn failures(&self) -> Vec<ContentFailure> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PeerCall::Fail { failure, .. } => Some(failure.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of hangups
    pub fn hangups(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, PeerCall::Hangup { .. }))
            .count()
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().push(call);
    }
}

impl SignalingPeer for RecordingPeer {
    fn fetch_properties(&self, object_path: &str, interface: PeerInterface) {
        self.record(PeerCall::Fetch {
            path: object_path.to_string(),
            interface,
        });
    }

    fn subscribe(&self, object_path: &str, signal: SignalKind) -> Result<(), PeerError> {
        if self.failing_signals.lock().contains(&signal) {
            return Err(PeerError::Remote {
                name: "org.freedesktop.DBus.Error.Failed".to_string(),
                message: format!("cannot connect to {}", signal),
            });
        }
        self.record(PeerCall::Subscribe {
            path: object_path.to_string(),
            signal,
        });
        Ok(())
    }

    fn media_description_proxy(&self, object_path: &str) -> MediaDescriptionProxy {
        MediaDescriptionProxy::tracked(object_path, self.live_proxies.clone())
    }

    fn accept_media_description(&self, offer: MediaDescriptionProxy, local: MediaDescription) {
        self.record(PeerCall::Accept {
            offer: offer.path().to_string(),
            description: local,
        });
    }

    fn reject_media_description(&self, offer: MediaDescriptionProxy) {
        self.record(PeerCall::Reject {
            offer: offer.path().to_string(),
        });
    }

    fn update_local_media_description(
        &self,
        content: &str,
        contact: ContactHandle,
        local: MediaDescription,
    ) {
        self.record(PeerCall::UpdateLocal {
            content: content.to_string(),
            contact,
            description: local,
        });
    }

    fn acknowledge_dtmf_change(&self, content: &str, event: u8, state: SendingState) {
        self.record(PeerCall::AcknowledgeDtmf {
            content: content.to_string(),
            event,
            state,
        });
    }

    fn fail_content(&self, content: &str, failure: &ContentFailure) {
        self.record(PeerCall::Fail {
            content: content.to_string(),
            failure: failure.clone(),
        });
    }

    fn hangup(
        &self,
        channel: &str,
        reason: CallStateChangeReason,
        detailed_reason: &str,
        message: &str,
    ) {
        self.record(PeerCall::Hangup {
            channel: channel.to_string(),
            reason,
            detailed_reason: detailed_reason.to_string(),
            message: message.to_string(),
        });
    }
}

// ============================================================================
// PROPERTY BUNDLES
// ============================================================================

/// Object value as a bundle; anything else gives an empty bundle
pub fn bundle(value: Value) -> PropertyBundle {
    match value {
        Value::Object(map) => map,
        _ => PropertyBundle::new(),
    }
}

/// Channel properties
pub fn channel_properties(contents: &[&str], hardware_streaming: bool) -> PropertyBundle {
    bundle(json!({
        "HardwareStreaming": hardware_streaming,
        "Contents": contents,
    }))
}

/// Content properties implementing the media interface
pub fn content_properties(
    media_type: MediaType,
    streams: &[&str],
    video_control: bool,
) -> PropertyBundle {
    let mut interfaces = vec![interface::CONTENT_MEDIA];
    if video_control {
        interfaces.push(interface::VIDEO_CONTROL);
    }
    bundle(json!({
        "Interfaces": interfaces,
        "Type": media_type.as_protocol(),
        "Streams": streams,
    }))
}

/// Media properties, optionally carrying an offer
pub fn media_properties(
    packetization: u32,
    offer: Option<(&str, ContactHandle, PropertyBundle)>,
    dtmf_state: SendingState,
    dtmf_event: u8,
) -> PropertyBundle {
    let offer = match offer {
        Some((path, contact, properties)) => json!([path, contact, properties]),
        None => json!(["/", 0, {}]),
    };
    bundle(json!({
        "Packetization": packetization,
        "MediaDescriptionOffer": offer,
        "CurrentDTMFState": dtmf_state.as_u32(),
        "CurrentDTMFEvent": dtmf_event,
    }))
}

/// Video control properties
pub fn video_control_properties(
    bitrate: u32,
    mtu: u32,
    manual_key_frames: bool,
    resolution: (u32, u32),
) -> PropertyBundle {
    bundle(json!({
        "Bitrate": bitrate,
        "MTU": mtu,
        "ManualKeyFrames": manual_key_frames,
        "VideoResolution": [resolution.0, resolution.1],
    }))
}

/// Stream properties; transport 1 is raw UDP, 2 is ICE
pub fn stream_properties(
    contact: ContactHandle,
    transport: u32,
    sending: SendingState,
) -> PropertyBundle {
    bundle(json!({
        "Contact": contact,
        "Transport": transport,
        "LocalSendingState": sending.as_u32(),
    }))
}

/// Offer bundle for `description`
pub fn offer_properties(description: &MediaDescription) -> PropertyBundle {
    serde_json::to_value(description)
        .map(bundle)
        .unwrap_or_default()
}

/// Offer carrying `codecs` and nothing else
pub fn codec_offer(codecs: Vec<ProtocolCodec>) -> MediaDescription {
    MediaDescription {
        interfaces: Vec::new(),
        codecs: Some(codecs),
        ..MediaDescription::default()
    }
}

/// Successful property fetch
pub fn fetched(path: &str, interface: PeerInterface, bundle: PropertyBundle) -> PeerEvent {
    PeerEvent::PropertiesFetched {
        object_path: path.to_string(),
        interface,
        result: Ok(bundle),
    }
}

/// Failed property fetch
pub fn fetch_failed(path: &str, interface: PeerInterface) -> PeerEvent {
    PeerEvent::PropertiesFetched {
        object_path: path.to_string(),
        interface,
        result: Err(PeerError::NoSuchObject {
            path: path.to_string(),
        }),
    }
}
