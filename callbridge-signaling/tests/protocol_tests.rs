//! Protocol bundles decoded and translated the way the bridge consumes them

use callbridge_core::{BridgeError, Codec, Direction, MediaType, RtpHeaderExtension};
use callbridge_signaling::translate::{
    engine_codecs, engine_header_extensions, local_description, transmitter_config,
};
use callbridge_signaling::{
    decode, interface, MediaDescription, MediaProperties, PropertyBundle, StreamProperties,
};
use serde_json::{json, Value};

fn bundle(value: Value) -> PropertyBundle {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

// ============================================================================
// REMOTE OFFERS
// ============================================================================

#[test]
fn test_offer_bundle_becomes_engine_codecs() {
    let offer = bundle(json!({
        "Interfaces": [interface::RTCP_FEEDBACK, interface::RTP_HEADER_EXTENSIONS],
        "Codecs": [
            {"Identifier": 96, "Name": "H264", "ClockRate": 90000, "Channels": 0,
             "Parameters": {"profile-level-id": "42e01f"}},
            {"Identifier": 97, "Name": "VP8", "ClockRate": 90000, "Channels": 0}
        ],
        "DoesAVPF": true,
        "FeedbackMessages": {
            "96": {"MinimumReportingInterval": 500,
                   "Messages": [{"Type": "nack", "Subtype": "pli"}]}
        },
        "HeaderExtensions": [
            {"Id": 1, "Direction": 7, "Uri": "urn:ietf:params:rtp-hdrext:toffset"}
        ]
    }));

    let description: MediaDescription =
        decode(interface::MEDIA_DESCRIPTION, &offer).expect("valid offer");
    assert!(description.has_interface(interface::RTCP_FEEDBACK));

    let codecs = engine_codecs(
        MediaType::Video,
        description.codec_list(),
        description.does_avpf.unwrap_or(false),
        description.feedback_messages.as_ref(),
    );
    assert_eq!(codecs.len(), 2);
    assert_eq!(codecs[0].optional_parameter("profile-level-id"), Some("42e01f"));
    assert_eq!(codecs[0].minimum_reporting_interval, Some(500));
    assert_eq!(codecs[0].feedback_params[0].subtype, "pli");
    assert_eq!(codecs[1].minimum_reporting_interval, Some(0));
    assert!(codecs[1].feedback_params.is_empty());

    let extensions =
        engine_header_extensions(description.header_extensions.as_deref().unwrap_or_default());
    assert_eq!(extensions[0].direction, Direction::Both);
}

#[test]
fn test_malformed_media_bundle_maps_to_invalid_property() {
    let props = bundle(json!({
        "Packetization": "rtp",
        "MediaDescriptionOffer": ["/", 0, {}],
        "CurrentDTMFState": 0,
        "CurrentDTMFEvent": 0
    }));

    let err = decode::<MediaProperties>(interface::CONTENT_MEDIA, &props).unwrap_err();
    let err: BridgeError = err.into();
    assert_eq!(err.error_code(), "INVALID_PROPERTY");
}

// ============================================================================
// LOCAL DESCRIPTIONS
// ============================================================================

#[test]
fn test_local_description_wire_shape() {
    let mut h264 = Codec::new(96, "H264", MediaType::Video, 90000);
    h264.add_feedback_parameter("ccm", "fir", "");
    let vp8 = Codec::new(97, "VP8", MediaType::Video, 90000);
    let extensions = vec![RtpHeaderExtension {
        id: 3,
        direction: Direction::Send,
        uri: "urn:ietf:params:rtp-hdrext:ssrc-audio-level".to_string(),
    }];

    let description = local_description(
        &[h264.clone(), vp8],
        &[h264],
        Some(extensions),
        true,
        5000,
    );
    let wire = serde_json::to_value(&description).expect("serializable");

    assert_eq!(wire["FurtherNegotiationRequired"], json!(true));
    assert_eq!(wire["DoesAVPF"], json!(true));
    assert_eq!(wire["Codecs"][0]["Updated"], json!(true));
    assert_eq!(wire["Codecs"][1]["Updated"], json!(false));
    assert_eq!(
        wire["FeedbackMessages"]["96"]["MinimumReportingInterval"],
        json!(5000)
    );
    assert!(wire["FeedbackMessages"].get("97").is_none());
    assert_eq!(wire["HeaderExtensions"][0]["Direction"], json!(1));
}

#[test]
fn test_stream_transport_selects_transmitter() {
    let props: StreamProperties = decode(
        interface::STREAM,
        &bundle(json!({
            "Contact": 4,
            "Transport": 2,
            "TransmitterParameters": {"stun-ip": "192.0.2.1"}
        })),
    )
    .expect("valid stream");

    let config = transmitter_config(&props).expect("known transport");
    assert_eq!(config.transmitter, "nice");
    assert_eq!(
        config.parameters.get("stun-ip").map(String::as_str),
        Some("192.0.2.1")
    );

    let unknown = StreamProperties {
        transport: 42,
        ..props
    };
    assert!(transmitter_config(&unknown).is_err());
}
