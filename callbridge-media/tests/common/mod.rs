//! Minimal engine doubles for media tests

#![allow(dead_code)]

use callbridge_core::{
    Codec, CodecListKind, Direction, ElementAddedHook, EngineConference, EngineError,
    EngineParticipant, EngineResult, EngineSession, EngineStream, MediaType, ObjectId,
    ParticipantRegistry, RtpHeaderExtension, SharedParticipants, SourceOutput, TransmitterConfig,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct TestParticipant {
    id: ObjectId,
}

impl EngineParticipant for TestParticipant {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[derive(Debug)]
pub struct TestStream {
    id: ObjectId,
    participant: ObjectId,
    pub disposed: AtomicBool,
    pub outputs: Mutex<Vec<SourceOutput>>,
}

impl EngineStream for TestStream {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn participant(&self) -> ObjectId {
        self.participant
    }

    fn set_transmitter(&self, config: &TransmitterConfig) -> EngineResult<()> {
        if config.transmitter == "broken" {
            return Err(EngineError::Transmitter {
                transmitter: config.transmitter.clone(),
                reason: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn rtp_header_extensions(&self) -> Option<Vec<RtpHeaderExtension>> {
        None
    }

    fn set_rtp_header_extensions(&self, _extensions: Vec<RtpHeaderExtension>) {}

    fn set_remote_codecs(&self, _codecs: &[Codec]) -> EngineResult<()> {
        Ok(())
    }

    fn src_outputs(&self) -> Vec<SourceOutput> {
        self.outputs.lock().clone()
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct TestSession {
    id: Option<ObjectId>,
    pub streams: Mutex<Vec<Arc<TestStream>>>,
    pub fail_new_stream: AtomicBool,
    pub fail_telephony: AtomicBool,
    pub telephony: Mutex<Vec<String>>,
    pub bitrate: Mutex<Option<u32>>,
    pub keyframes: AtomicUsize,
}

impl TestSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Some(ObjectId::next()),
            ..Self::default()
        })
    }

    pub fn stream_for(&self, participant: ObjectId) -> Option<Arc<TestStream>> {
        self.streams
            .lock()
            .iter()
            .find(|s| s.participant == participant)
            .cloned()
    }
}

impl EngineSession for TestSession {
    fn id(&self) -> ObjectId {
        self.id.unwrap_or(ObjectId(0))
    }

    fn new_stream(
        &self,
        participant: &Arc<dyn EngineParticipant>,
        _direction: Direction,
    ) -> EngineResult<Arc<dyn EngineStream>> {
        if self.fail_new_stream.load(Ordering::SeqCst) {
            return Err(EngineError::Construction {
                object: "stream".to_string(),
                reason: "refused".to_string(),
            });
        }
        let stream = Arc::new(TestStream {
            id: ObjectId::next(),
            participant: participant.id(),
            disposed: AtomicBool::new(false),
            outputs: Mutex::new(Vec::new()),
        });
        self.streams.lock().push(stream.clone());
        Ok(stream)
    }

    fn set_codec_preferences(&self, _codecs: &[Codec]) -> EngineResult<()> {
        Ok(())
    }

    fn codecs(&self, _kind: CodecListKind) -> Option<Vec<Codec>> {
        Some(vec![Codec::new(0, "PCMU", MediaType::Audio, 8000)])
    }

    fn codecs_need_resend(&self, _old: &[Codec], _new: &[Codec]) -> Vec<Codec> {
        Vec::new()
    }

    fn rtp_header_extensions(&self) -> Vec<RtpHeaderExtension> {
        Vec::new()
    }

    fn start_telephony_event(&self, event: u8, volume: u8) -> EngineResult<()> {
        if self.fail_telephony.load(Ordering::SeqCst) {
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
        if self.fail_telephony.load(Ordering::SeqCst) {
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

    fn dispose(&self) {}
}

#[derive(Debug)]
pub struct TestConference {
    id: ObjectId,
    pub hooks: Mutex<Vec<Arc<dyn ElementAddedHook>>>,
}

impl TestConference {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            hooks: Mutex::new(Vec::new()),
        })
    }
}

impl EngineConference for TestConference {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn conference_type(&self) -> String {
        "rtp".to_string()
    }

    fn new_session(&self, _media_type: MediaType) -> EngineResult<Arc<dyn EngineSession>> {
        Ok(TestSession::new())
    }

    fn new_participant(&self) -> EngineResult<Arc<dyn EngineParticipant>> {
        Ok(Arc::new(TestParticipant {
            id: ObjectId::next(),
        }))
    }

    fn default_codec_preferences(&self, _media_type: MediaType) -> Vec<Codec> {
        Vec::new()
    }

    fn add_element_hook(&self, hook: Arc<dyn ElementAddedHook>) {
        self.hooks.lock().push(hook);
    }

    fn remove_element_hook(&self, hook: &Arc<dyn ElementAddedHook>) {
        self.hooks
            .lock()
            .retain(|h| Arc::as_ptr(h) as *const () != Arc::as_ptr(hook) as *const ());
    }
}

pub fn participants() -> SharedParticipants {
    Arc::new(Mutex::new(ParticipantRegistry::new()))
}
