//! Channel and content lifecycle: initialisation, shared engine objects,
//! failures and teardown

mod common;

use callbridge::testing::{
    channel_properties, content_properties, fetch_failed, fetched, media_properties, PeerCall,
};
use callbridge::{
    BridgeEvent, BusOutcome, CallStateChangeReason, ContentPhase, EngineMessage,
    EngineMessageKind, MediaType, ObjectId, PeerEvent, PeerInterface, SendingState, SignalKind,
    SourceOutput,
};
use callbridge_core::error::detail;
use common::{Harness, AUDIO, CHANNEL, VIDEO};
use serde_json::json;
use std::sync::atomic::Ordering;

fn init_failures(events: &[BridgeEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::ContentInitFailed {
                content,
                error_code,
                ..
            } => Some((content.clone(), error_code.clone())),
            _ => None,
        })
        .collect()
}

fn conference_events(events: &[BridgeEvent]) -> (usize, usize) {
    let added = events
        .iter()
        .filter(|e| matches!(e, BridgeEvent::ConferenceAdded { .. }))
        .count();
    let removed = events
        .iter()
        .filter(|e| matches!(e, BridgeEvent::ConferenceRemoved { .. }))
        .count();
    (added, removed)
}

// ============================================================================
// CHANNEL SETUP
// ============================================================================

#[tokio::test]
async fn test_channel_subscribes_and_starts_contents() {
    let mut harness = Harness::new();
    assert!(harness.peer.fetched(CHANNEL, PeerInterface::Channel));

    harness.open_channel(&[AUDIO]);

    let channel = harness.bridge.channel(CHANNEL).unwrap();
    assert!(channel.is_ready());
    assert_eq!(channel.content_paths(), vec![AUDIO.to_string()]);
    assert!(harness.peer.fetched(AUDIO, PeerInterface::Content));
    assert!(harness.peer.calls().contains(&PeerCall::Subscribe {
        path: CHANNEL.to_string(),
        signal: SignalKind::ContentAdded,
    }));
    assert!(harness.peer.calls().contains(&PeerCall::Subscribe {
        path: AUDIO.to_string(),
        signal: SignalKind::StreamsAdded,
    }));
}

#[tokio::test]
async fn test_hardware_streaming_channel_is_left_alone() {
    let mut harness = Harness::new();
    harness.send(fetched(
        CHANNEL,
        PeerInterface::Channel,
        channel_properties(&[AUDIO], true),
    ));

    assert!(!harness.bridge.channel(CHANNEL).unwrap().is_ready());
    assert_eq!(harness.peer.calls().len(), 1);
    assert_eq!(harness.peer.hangups(), 0);
}

#[tokio::test]
async fn test_channel_fetch_failure_hangs_up() {
    let mut harness = Harness::new();
    harness.send(fetch_failed(CHANNEL, PeerInterface::Channel));

    assert_eq!(harness.peer.hangups(), 1);
    assert!(harness
        .drain_events()
        .contains(&BridgeEvent::ChannelHungUp {
            channel: CHANNEL.to_string()
        }));
}

#[tokio::test]
async fn test_content_added_only_after_channel_properties() {
    let mut harness = Harness::new();
    harness.send(PeerEvent::ContentAdded {
        content: AUDIO.to_string(),
    });
    assert!(!harness.peer.fetched(AUDIO, PeerInterface::Content));

    harness.open_channel(&[]);
    harness.send(PeerEvent::ContentAdded {
        content: AUDIO.to_string(),
    });
    assert!(harness.peer.fetched(AUDIO, PeerInterface::Content));
    assert_eq!(
        harness.bridge.channel(CHANNEL).unwrap().content_paths(),
        vec![AUDIO.to_string()]
    );
}

#[tokio::test]
async fn test_content_ready_creates_queued_streams() {
    let mut harness = Harness::new();
    harness.open_channel(&[AUDIO]);
    harness.content_props(AUDIO, MediaType::Audio, &["/s1", "/s2"]);

    assert_eq!(
        harness.content(AUDIO).outstanding_streams(),
        ["/s1".to_string(), "/s2".to_string()]
    );
    assert!(!harness.peer.fetched("/s1", PeerInterface::Stream));

    harness.media_props(AUDIO, None);

    let content = harness.content(AUDIO);
    assert_eq!(content.phase(), ContentPhase::Ready);
    assert!(content.outstanding_streams().is_empty());
    assert_eq!(content.stream_paths().len(), 2);
    assert!(harness.peer.fetched("/s1", PeerInterface::Stream));
    assert!(harness.peer.fetched("/s2", PeerInterface::Stream));
    assert!(harness.drain_events().contains(&BridgeEvent::ContentReady {
        content: AUDIO.to_string(),
        media_type: MediaType::Audio,
    }));
    assert_eq!(harness.session().preferences.lock().as_deref(), Some(&[][..]));
}

// ============================================================================
// INITIALISATION FAILURES
// ============================================================================

#[tokio::test]
async fn test_content_without_media_interface_fails() {
    let mut harness = Harness::new();
    harness.open_channel(&[AUDIO]);

    let mut props = content_properties(MediaType::Audio, &[], false);
    props.insert("Interfaces".to_string(), json!([]));
    harness.send(fetched(AUDIO, PeerInterface::Content, props));

    let events = harness.drain_events();
    assert_eq!(
        init_failures(&events),
        vec![(AUDIO.to_string(), "INVALID_PROPERTY".to_string())]
    );
    assert_eq!(harness.content(AUDIO).phase(), ContentPhase::Failed);
    assert_eq!(harness.peer.failures().len(), 1);

    // A failed content ignores whatever the peer sends next
    harness.media_props(AUDIO, None);
    assert!(harness.engine.conferences().is_empty());
    assert_eq!(harness.peer.failures().len(), 1);
}

#[tokio::test]
async fn test_content_fetch_failure() {
    let mut harness = Harness::new();
    harness.open_channel(&[AUDIO]);
    harness.send(fetch_failed(AUDIO, PeerInterface::Content));

    assert_eq!(
        init_failures(&harness.drain_events()),
        vec![(AUDIO.to_string(), "PROPERTY_FETCH_FAILED".to_string())]
    );
}

#[tokio::test]
async fn test_unsupported_packetization_is_a_media_error() {
    let mut harness = Harness::new();
    harness.open_channel(&[AUDIO]);
    harness.content_props(AUDIO, MediaType::Audio, &[]);
    harness.send(fetched(
        AUDIO,
        PeerInterface::ContentMedia,
        media_properties(2, None, SendingState::None, 0),
    ));

    assert_eq!(
        init_failures(&harness.drain_events()),
        vec![(AUDIO.to_string(), "UNSUPPORTED_PACKETIZATION".to_string())]
    );
    let failures = harness.peer.failures();
    assert_eq!(failures[0].reason, CallStateChangeReason::MediaError);
    assert_eq!(failures[0].detailed_reason, detail::MEDIA_UNSUPPORTED_TYPE);
    assert!(harness.engine.conferences().is_empty());
}

#[tokio::test]
async fn test_session_failure_releases_the_conference() {
    let mut harness = Harness::new();
    harness
        .engine
        .knobs()
        .fail_session
        .store(true, Ordering::SeqCst);
    harness.ready_audio(&[], None);

    let events = harness.drain_events();
    assert_eq!(
        init_failures(&events),
        vec![(AUDIO.to_string(), "SESSION_CREATION_FAILED".to_string())]
    );
    assert_eq!(conference_events(&events), (1, 1));
    let channel = harness.bridge.channel(CHANNEL).unwrap();
    assert!(channel.resources().conferences.lock().is_empty());
}

#[tokio::test]
async fn test_immediate_content_failure_stops_adding_contents() {
    let mut harness = Harness::new();
    harness.peer.fail_subscription(SignalKind::StreamsAdded);
    harness.open_channel(&[AUDIO, VIDEO]);

    assert!(harness
        .bridge
        .channel(CHANNEL)
        .unwrap()
        .content_paths()
        .is_empty());
    assert_eq!(
        init_failures(&harness.drain_events()),
        vec![(AUDIO.to_string(), "SIGNAL_SUBSCRIPTION_FAILED".to_string())]
    );
    assert_eq!(harness.peer.failures().len(), 1);
}

// ============================================================================
// SHARED ENGINE OBJECTS
// ============================================================================

#[tokio::test]
async fn test_streams_share_engine_stream_per_contact() {
    let mut harness = Harness::new();
    harness.ready_audio(&["/s1", "/s2"], None);
    harness.stream_props("/s1", 5, SendingState::None);
    harness.stream_props("/s2", 5, SendingState::None);

    let session = harness.session();
    {
        let pool = harness.content(AUDIO).pool();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.use_count(5), 2);
    }
    assert_eq!(session.live_streams(), 1);
    let participants = harness
        .bridge
        .channel(CHANNEL)
        .unwrap()
        .resources()
        .participants
        .clone();
    assert_eq!(participants.lock().len(), 1);

    harness.send(PeerEvent::StreamsRemoved {
        content: AUDIO.to_string(),
        streams: vec!["/s1".to_string()],
    });
    assert_eq!(harness.content(AUDIO).pool().use_count(5), 1);
    assert_eq!(session.live_streams(), 1);

    harness.send(PeerEvent::StreamsRemoved {
        content: AUDIO.to_string(),
        streams: vec!["/s2".to_string()],
    });
    assert!(harness.content(AUDIO).pool().is_empty());
    assert_eq!(session.live_streams(), 0);
    assert!(participants.lock().is_empty());
}

#[tokio::test]
async fn test_contents_share_one_conference() {
    let mut harness = Harness::new();
    harness.open_channel(&[AUDIO, VIDEO]);
    harness.content_props(AUDIO, MediaType::Audio, &[]);
    harness.media_props(AUDIO, None);
    harness.content_props(VIDEO, MediaType::Video, &[]);
    harness.video_props(VIDEO, 0, (0, 0));
    harness.media_props(VIDEO, None);

    assert_eq!(harness.engine.conferences().len(), 1);
    let conferences = harness
        .bridge
        .channel(CHANNEL)
        .unwrap()
        .resources()
        .conferences
        .clone();
    assert_eq!(conferences.lock().use_count("rtp"), 2);
    assert_eq!(conference_events(&harness.drain_events()), (1, 0));

    harness.send(PeerEvent::ContentRemoved {
        content: AUDIO.to_string(),
    });
    assert_eq!(conferences.lock().use_count("rtp"), 1);
    assert_eq!(conference_events(&harness.drain_events()), (0, 0));

    harness.send(PeerEvent::ContentRemoved {
        content: VIDEO.to_string(),
    });
    assert!(conferences.lock().is_empty());
    assert_eq!(conference_events(&harness.drain_events()), (0, 1));
}

#[tokio::test]
async fn test_removing_channel_releases_everything() {
    let mut harness = Harness::new();
    harness.ready_audio(&["/s1"], Some(("/offer/1", 9)));
    harness.stream_props("/s1", 5, SendingState::Sending);
    assert_eq!(harness.peer.live_proxies(), 1);

    let session = harness.session();
    harness.drain_events();

    assert!(harness.bridge.remove_channel(CHANNEL));

    assert_eq!(harness.bridge.channel_count(), 0);
    assert_eq!(harness.peer.live_proxies(), 0);
    assert!(session.disposed.load(Ordering::SeqCst));
    assert_eq!(session.live_streams(), 0);
    assert_eq!(conference_events(&harness.drain_events()), (0, 1));
    assert!(!harness.bridge.remove_channel(CHANNEL));
}

// ============================================================================
// ENGINE BUS
// ============================================================================

#[tokio::test]
async fn test_conference_error_hangs_up() {
    let mut harness = Harness::new();
    harness.ready_audio(&[], None);

    let outcome = harness.bus(EngineMessageKind::Warning {
        message: "late packet".to_string(),
        debug: Some("jitterbuffer".to_string()),
    });
    assert_eq!(outcome, BusOutcome::Handled);
    assert_eq!(harness.peer.hangups(), 0);

    let outcome = harness.bus(EngineMessageKind::Error {
        message: "pipeline broke".to_string(),
        debug: Some("element failed".to_string()),
    });
    assert_eq!(outcome, BusOutcome::Handled);
    assert!(matches!(
        harness.peer.calls().last(),
        Some(PeerCall::Hangup {
            reason: CallStateChangeReason::Unknown,
            ..
        })
    ));
    assert!(harness
        .drain_events()
        .contains(&BridgeEvent::ChannelHungUp {
            channel: CHANNEL.to_string()
        }));
}

#[tokio::test]
async fn test_messages_from_unknown_origins_are_not_claimed() {
    let mut harness = Harness::new();
    harness.ready_audio(&[], None);
    let session = harness.session_id();

    let outcome = harness.bridge.handle_bus_message(&EngineMessage::new(
        ObjectId::next(),
        EngineMessageKind::CodecsChanged { session },
    ));

    assert_eq!(outcome, BusOutcome::Unhandled);
    assert_eq!(harness.bridge.trace().unhandled(), 1);
}

#[tokio::test]
async fn test_stream_error_fails_its_content() {
    let mut harness = Harness::new();
    harness.ready_audio(&["/s1"], None);
    harness.stream_props("/s1", 5, SendingState::None);
    let stream = harness.session().streams.lock()[0].object_id();

    let outcome = harness.bus(EngineMessageKind::StreamError {
        stream,
        code: 3,
        message: "transmitter died".to_string(),
    });

    assert!(outcome.is_handled());
    let failures = harness.peer.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].detailed_reason, detail::MEDIA_STREAMING_ERROR);
    assert_eq!(harness.content(AUDIO).phase(), ContentPhase::Ready);
}

#[tokio::test]
async fn test_session_error_fails_its_content() {
    let mut harness = Harness::new();
    harness.ready_audio(&[], None);
    let session = harness.session_id();

    let outcome = harness.bus(EngineMessageKind::SessionError {
        session,
        code: 1,
        message: "encoder gone".to_string(),
    });

    assert!(outcome.is_handled());
    assert!(harness.drain_events().iter().any(|e| matches!(
        e,
        BridgeEvent::ContentFailed { content, .. } if content == AUDIO
    )));
}

#[tokio::test]
async fn test_source_output_is_reported_with_its_contact() {
    let mut harness = Harness::new();
    harness.ready_audio(&["/s1"], None);
    harness.stream_props("/s1", 5, SendingState::None);
    let stream = harness.session().streams.lock()[0].object_id();
    harness.drain_events();

    let output = SourceOutput {
        name: "src_5".to_string(),
        codec: None,
    };
    let outcome = harness.bus(EngineMessageKind::SourceOutputAdded {
        stream,
        output: output.clone(),
    });

    assert!(outcome.is_handled());
    assert_eq!(
        harness.drain_events(),
        vec![BridgeEvent::SourceOutputAdded {
            content: AUDIO.to_string(),
            handle: 5,
            stream,
            output,
        }]
    );
}
