//! DTMF and video control driven from peer requests and engine reports

mod common;

use callbridge::testing::FakeElement;
use callbridge::{BridgeEvent, DtmfMethod, EngineMessageKind, MediaType, PeerEvent, SendingState};
use callbridge_core::error::detail;
use callbridge_core::ElementParameter;
use callbridge_signaling::VideoResolution;
use common::{Harness, AUDIO, VIDEO};
use std::sync::atomic::Ordering;

/// Audio content whose first offer has been applied
fn negotiated_audio() -> Harness {
    let mut harness = Harness::new();
    harness.ready_audio(&["/s1"], Some(("/offer/1", 5)));
    harness.stream_props("/s1", 5, SendingState::Sending);
    assert_eq!(harness.peer.accepts().len(), 1);
    harness
}

fn ready_video(mtu: u32, resolution: (u32, u32)) -> Harness {
    let mut harness = Harness::new();
    harness.open_channel(&[VIDEO]);
    harness.content_props(VIDEO, MediaType::Video, &[]);
    harness.video_props(VIDEO, mtu, resolution);
    harness.media_props(VIDEO, None);
    harness
}

fn dtmf_request(event: u8, state: SendingState) -> PeerEvent {
    PeerEvent::DtmfChangeRequested {
        content: AUDIO.to_string(),
        event,
        state: state.as_u32(),
    }
}

fn video_events(events: Vec<BridgeEvent>) -> Vec<BridgeEvent> {
    events.into_iter().filter(|e| e.is_video_event()).collect()
}

// ============================================================================
// DTMF
// ============================================================================

#[tokio::test]
async fn test_dtmf_tone_is_acknowledged_once_engine_confirms() {
    let mut harness = negotiated_audio();
    let session = harness.session_id();

    harness.send(dtmf_request(3, SendingState::PendingSend));
    assert_eq!(
        harness.session().telephony.lock().as_slice(),
        ["start 3 8"]
    );
    assert!(harness.peer.acknowledgements().is_empty());
    assert_eq!(harness.content(AUDIO).dtmf_state(), SendingState::PendingSend);

    let outcome = harness.bus(EngineMessageKind::TelephonyEventStarted {
        session,
        method: DtmfMethod::RtpEvent,
        event: 3,
        volume: 8,
    });
    assert!(outcome.is_handled());
    assert_eq!(
        harness.peer.acknowledgements(),
        vec![(3, SendingState::Sending)]
    );

    harness.send(dtmf_request(3, SendingState::PendingStopSending));
    harness.bus(EngineMessageKind::TelephonyEventStopped {
        session,
        method: DtmfMethod::RtpEvent,
    });
    assert_eq!(
        harness.peer.acknowledgements(),
        vec![(3, SendingState::Sending), (3, SendingState::None)]
    );
    assert_eq!(
        harness.session().telephony.lock().as_slice(),
        ["start 3 8", "stop"]
    );
    assert!(harness.peer.failures().is_empty());
}

#[tokio::test]
async fn test_dtmf_request_waits_for_remote_codecs() {
    let mut harness = Harness::new();
    harness.ready_audio(&["/s1"], None);

    harness.send(dtmf_request(6, SendingState::PendingSend));
    assert!(harness.session().telephony.lock().is_empty());

    harness.offer(AUDIO, "/offer/1", 5);
    harness.stream_props("/s1", 5, SendingState::None);

    assert_eq!(
        harness.session().telephony.lock().as_slice(),
        ["start 6 8"]
    );
}

#[tokio::test]
async fn test_engine_starting_wrong_event_fails_content() {
    let mut harness = negotiated_audio();
    let session = harness.session_id();
    harness.send(dtmf_request(3, SendingState::PendingSend));

    harness.bus(EngineMessageKind::TelephonyEventStarted {
        session,
        method: DtmfMethod::Auto,
        event: 4,
        volume: 8,
    });

    assert!(harness.peer.acknowledgements().is_empty());
    let failures = harness.peer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].detailed_reason, detail::MEDIA_STREAMING_ERROR);
}

#[tokio::test]
async fn test_engine_stopping_idle_tone_fails_content() {
    let mut harness = negotiated_audio();
    let session = harness.session_id();

    harness.bus(EngineMessageKind::TelephonyEventStopped {
        session,
        method: DtmfMethod::Sound,
    });

    assert_eq!(harness.peer.failures().len(), 1);
    assert!(harness.peer.acknowledgements().is_empty());
}

#[tokio::test]
async fn test_refused_tone_reverts_peer_state() {
    let mut harness = negotiated_audio();
    harness
        .engine
        .knobs()
        .fail_telephony
        .store(true, Ordering::SeqCst);

    harness.send(dtmf_request(1, SendingState::PendingSend));

    assert_eq!(harness.peer.failures().len(), 1);
    assert_eq!(
        harness.peer.acknowledgements(),
        vec![(1, SendingState::None)]
    );
    assert_eq!(harness.content(AUDIO).dtmf_state(), SendingState::None);
}

#[tokio::test]
async fn test_invalid_dtmf_target_is_a_protocol_violation() {
    let mut harness = negotiated_audio();
    harness.send(dtmf_request(1, SendingState::Sending));

    let failures = harness.peer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].detailed_reason, detail::CONFUSED);
    assert!(harness.session().telephony.lock().is_empty());
}

// ============================================================================
// VIDEO CONTROL
// ============================================================================

#[tokio::test]
async fn test_initial_resolution_is_reported() {
    let mut harness = ready_video(0, (320, 240));

    assert_eq!(
        video_events(harness.drain_events()),
        vec![
            BridgeEvent::ResolutionChanged {
                content: VIDEO.to_string(),
                width: 320,
                height: 240,
            },
            BridgeEvent::RestartSource {
                content: VIDEO.to_string()
            },
        ]
    );
    assert_eq!(harness.content(VIDEO).width(), 320);
    assert_eq!(harness.content(VIDEO).height(), 240);
}

#[tokio::test]
async fn test_zero_dimension_resolution_is_ignored() {
    let mut harness = ready_video(0, (0, 0));
    assert!(video_events(harness.drain_events()).is_empty());

    harness.send(PeerEvent::VideoResolutionChanged {
        content: VIDEO.to_string(),
        resolution: VideoResolution {
            width: 640,
            height: 0,
        },
    });
    assert!(video_events(harness.drain_events()).is_empty());
    assert_eq!(harness.content(VIDEO).width(), 0);

    harness.send(PeerEvent::VideoResolutionChanged {
        content: VIDEO.to_string(),
        resolution: VideoResolution {
            width: 640,
            height: 480,
        },
    });
    assert_eq!(video_events(harness.drain_events()).len(), 2);
    assert_eq!(harness.content(VIDEO).width(), 640);
    assert_eq!(harness.content(VIDEO).height(), 480);
}

#[tokio::test]
async fn test_framerate_change_restarts_source() {
    let mut harness = ready_video(0, (0, 0));
    harness.send(PeerEvent::FramerateChanged {
        content: VIDEO.to_string(),
        framerate: 30,
    });

    assert_eq!(
        video_events(harness.drain_events()),
        vec![
            BridgeEvent::FramerateChanged {
                content: VIDEO.to_string(),
                framerate: 30,
            },
            BridgeEvent::RestartSource {
                content: VIDEO.to_string()
            },
        ]
    );
    assert_eq!(harness.content(VIDEO).framerate(), 30);
}

#[tokio::test]
async fn test_mtu_reaches_existing_and_new_elements() {
    let mut harness = ready_video(1200, (0, 0));
    let conference = harness.conference("rtp");
    assert_eq!(conference.hook_count(), 1);

    let payloader = FakeElement::new("rtph264pay", &[ElementParameter::Mtu]);
    conference.add_element(payloader.clone());
    assert_eq!(payloader.value(ElementParameter::Mtu), Some(1200));

    harness.send(PeerEvent::MtuChanged {
        content: VIDEO.to_string(),
        mtu: 1400,
    });
    assert_eq!(conference.hook_count(), 1);
    assert_eq!(payloader.value(ElementParameter::Mtu), Some(1400));

    let encoder = FakeElement::new("vp8enc", &[ElementParameter::KeyIntMax]);
    conference.add_element(encoder.clone());
    assert_eq!(encoder.value(ElementParameter::KeyIntMax), None);
}

#[tokio::test]
async fn test_bitrate_and_keyframes_go_to_the_session() {
    let mut harness = ready_video(0, (0, 0));

    harness.send(PeerEvent::BitrateChanged {
        content: VIDEO.to_string(),
        bitrate: 256_000,
    });
    harness.send(PeerEvent::KeyFrameRequested {
        content: VIDEO.to_string(),
    });

    let session = harness.session();
    assert_eq!(*session.bitrate.lock(), Some(256_000));
    assert_eq!(session.keyframes.load(Ordering::SeqCst), 1);
    assert_eq!(harness.content(VIDEO).video().unwrap().bitrate(), 256_000);
}

#[tokio::test]
async fn test_removing_video_content_removes_element_hook() {
    let mut harness = ready_video(1200, (0, 0));
    let conference = harness.conference("rtp");
    assert_eq!(conference.hook_count(), 1);

    harness.send(PeerEvent::ContentRemoved {
        content: VIDEO.to_string(),
    });

    assert_eq!(conference.hook_count(), 0);
}
