//! Conversion between protocol records and engine types

use crate::protocol::{
    interface, HeaderExtensionRecord, MediaDescription, ProtocolCodec, RtcpFeedbackEntry,
    RtcpFeedbackMessage, StreamProperties, StreamTransport, REPORTING_INTERVAL_UNSET,
};
use callbridge_core::{
    BridgeError, BridgeResult, Codec, Direction, MediaType, RtpHeaderExtension,
    TransmitterConfig,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Convert offered codecs into engine codecs.
///
/// With AVPF every codec reports immediately (interval 0); an explicit
/// per-payload-type interval overrides that.
pub fn engine_codecs(
    media_type: MediaType,
    codecs: &[ProtocolCodec],
    does_avpf: bool,
    feedback: Option<&BTreeMap<u32, RtcpFeedbackEntry>>,
) -> Vec<Codec> {
    codecs
        .iter()
        .map(|record| {
            let mut codec = Codec::new(
                record.identifier,
                record.name.clone(),
                media_type,
                record.clock_rate,
            )
            .with_channels(record.channels);

            for (name, value) in &record.parameters {
                codec.add_optional_parameter(name.clone(), value.clone());
            }

            if does_avpf {
                codec.minimum_reporting_interval = Some(0);
            }

            if let Some(entry) = feedback.and_then(|f| f.get(&record.identifier)) {
                if entry.minimum_reporting_interval != REPORTING_INTERVAL_UNSET {
                    codec.minimum_reporting_interval = Some(entry.minimum_reporting_interval);
                }
                for message in &entry.messages {
                    codec.add_feedback_parameter(
                        message.kind.clone(),
                        message.subtype.clone(),
                        message.parameters.clone(),
                    );
                }
            }

            debug!("{}", codec);
            codec
        })
        .collect()
}

/// Convert header extension records; unknown directions become bidirectional
pub fn engine_header_extensions(records: &[HeaderExtensionRecord]) -> Vec<RtpHeaderExtension> {
    records
        .iter()
        .map(|record| RtpHeaderExtension {
            id: record.id,
            direction: Direction::from_protocol(record.direction).unwrap_or(Direction::Both),
            uri: record.uri.clone(),
        })
        .collect()
}

/// Convert engine header extensions into records
pub fn protocol_header_extensions(extensions: &[RtpHeaderExtension]) -> Vec<HeaderExtensionRecord> {
    extensions
        .iter()
        .map(|ext| HeaderExtensionRecord {
            id: ext.id,
            direction: ext.direction.as_protocol(),
            uri: ext.uri.clone(),
            parameters: String::new(),
        })
        .collect()
}

/// Build the local description for `codecs`.
///
/// Codecs found in `resend` are flagged as updated and make further
/// negotiation required. Header extensions are included when given; the
/// RTCP feedback map is included when `with_rtcp_feedback` is set, with
/// `default_interval` standing in for unset reporting intervals.
pub fn local_description(
    codecs: &[Codec],
    resend: &[Codec],
    header_extensions: Option<Vec<RtpHeaderExtension>>,
    with_rtcp_feedback: bool,
    default_interval: u32,
) -> MediaDescription {
    let records = codecs
        .iter()
        .map(|codec| ProtocolCodec {
            identifier: codec.payload_type,
            name: codec.encoding_name.clone(),
            clock_rate: codec.clock_rate,
            channels: codec.channels,
            updated: resend.iter().any(|r| r.same_as(codec)),
            parameters: codec
                .optional_params
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect(),
        })
        .collect();

    let feedback = with_rtcp_feedback.then(|| {
        codecs
            .iter()
            .filter(|c| c.minimum_reporting_interval.is_some() || !c.feedback_params.is_empty())
            .map(|c| {
                let entry = RtcpFeedbackEntry {
                    minimum_reporting_interval: c
                        .minimum_reporting_interval
                        .unwrap_or(default_interval),
                    messages: c
                        .feedback_params
                        .iter()
                        .map(|fb| RtcpFeedbackMessage {
                            kind: fb.kind.clone(),
                            subtype: fb.subtype.clone(),
                            parameters: fb.extra_params.clone(),
                        })
                        .collect(),
                };
                (c.payload_type, entry)
            })
            .collect::<BTreeMap<_, _>>()
    });

    let mut interfaces = Vec::new();
    if header_extensions.is_some() {
        interfaces.push(interface::RTP_HEADER_EXTENSIONS.to_string());
    }
    if feedback.is_some() {
        interfaces.push(interface::RTCP_FEEDBACK.to_string());
    }

    MediaDescription {
        interfaces,
        codecs: Some(records),
        further_negotiation_required: !resend.is_empty(),
        does_avpf: feedback.as_ref().map(|f| !f.is_empty()),
        feedback_messages: feedback,
        header_extensions: header_extensions.map(|exts| protocol_header_extensions(&exts)),
    }
}

/// Transmitter configuration requested by a stream
pub fn transmitter_config(props: &StreamProperties) -> BridgeResult<TransmitterConfig> {
    let transport = StreamTransport::from_protocol(props.transport).ok_or_else(|| {
        BridgeError::InvalidProperty {
            interface: interface::STREAM.to_string(),
            reason: format!("unknown transport {}", props.transport),
        }
    })?;

    Ok(TransmitterConfig {
        transmitter: transport.transmitter().to_string(),
        parameters: props.transmitter_parameters.clone(),
    })
}
