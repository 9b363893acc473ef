//! Media description negotiation for one content
//!
//! Remote offers arrive through the peer and are applied to the engine
//! stream of the offering contact. When that stream does not exist yet the
//! offer is parked until it does. Local codecs flow the other way: whenever
//! the engine reports new codecs, the negotiator answers the open offer or
//! publishes an unsolicited update.

use callbridge_core::{
    codec_lists_equal, BridgeError, BridgeResult, Codec, CodecListKind, ContactHandle,
    EngineSession, EngineStream, MediaType, RtpHeaderExtension, NO_CONTACT,
};
use callbridge_signaling::translate::{engine_codecs, engine_header_extensions, local_description};
use callbridge_signaling::{
    decode, interface, validate_object_path, MediaDescription, MediaDescriptionProxy,
    PropertyBundle, SignalingPeer,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Negotiation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No session yet
    Uninitialized,
    /// Session exists, no offer seen
    AwaitingFirstOffer,
    /// An offer is parked or waiting for its answer
    Negotiating,
    /// Every offer has been answered
    Stable,
    /// Torn down
    Disposed,
}

/// Remote offer decoded into engine terms
#[derive(Debug)]
pub struct ParsedOffer {
    /// Handle used to answer the offer
    pub proxy: MediaDescriptionProxy,
    /// Contact the offer comes from
    pub contact: ContactHandle,
    /// Offered codecs
    pub codecs: Vec<Codec>,
    /// Offered header extensions, when the offer carries them
    pub header_extensions: Option<Vec<RtpHeaderExtension>>,
}

/// Result of applying an offer to a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The stream took the codecs and the offer is open
    Applied {
        /// Whether these are the first remote codecs of the content
        first_remote_codecs: bool,
    },
    /// The engine refused the codecs and the offer was rejected
    Rejected {
        /// Engine reason
        reason: String,
    },
}

/// What [`MediaDescriptionNegotiator::try_sending_local_codecs`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// An offer is parked waiting for its stream
    Deferred,
    /// The engine has no codecs yet
    NoCodecs,
    /// Codecs equal the last ones sent
    Unchanged,
    /// Nothing to answer and nothing needing a resend
    NothingToSend,
    /// The open offer was accepted
    Accepted,
    /// An unsolicited update was published
    Updated,
}

/// Everything outside the negotiator that sending local codecs needs
#[derive(Debug)]
pub struct NegotiationContext<'a> {
    /// Peer receiving the description
    pub peer: &'a dyn SignalingPeer,
    /// Content path for unsolicited updates
    pub content: &'a str,
    /// Session providing local codecs
    pub session: &'a Arc<dyn EngineSession>,
    /// Whether any stream of the content is sending
    pub local_sending: bool,
    /// Reporting interval used when a codec has none
    pub default_reporting_interval: u32,
}

/// Offer/answer state of one content
#[derive(Debug, Default)]
pub struct MediaDescriptionNegotiator {
    media_type: Option<MediaType>,
    negotiated_once: bool,
    disposed: bool,
    pending_offer: Option<ParsedOffer>,
    open_offer: Option<MediaDescriptionProxy>,
    last_sent_codecs: Option<Vec<Codec>>,
    current_has_rtp_hdrext: bool,
    current_has_rtcp_fb: bool,
    has_rtp_hdrext: bool,
    has_rtcp_fb: bool,
    remote_codecs_set: bool,
}

impl MediaDescriptionNegotiator {
    /// Negotiator waiting for its session
    pub fn new() -> Self {
        Self::default()
    }

    /// The content's session exists
    pub fn session_ready(&mut self, media_type: MediaType) {
        self.media_type = Some(media_type);
    }

    /// Current lifecycle state
    pub fn state(&self) -> NegotiationState {
        if self.disposed {
            NegotiationState::Disposed
        } else if self.media_type.is_none() {
            NegotiationState::Uninitialized
        } else if !self.negotiated_once {
            NegotiationState::AwaitingFirstOffer
        } else if self.pending_offer.is_some() || self.open_offer.is_some() {
            NegotiationState::Negotiating
        } else {
            NegotiationState::Stable
        }
    }

    /// Drop the parked offer and the unanswered open offer
    pub fn discard_stale(&mut self) {
        if let Some(stale) = self.pending_offer.take() {
            debug!("Dropping pending offer {}", stale.proxy.path());
        }
        if let Some(stale) = self.open_offer.take() {
            debug!("Dropping unanswered offer {}", stale.path());
        }
    }

    /// Decode an offer; stale offers are discarded first
    pub fn receive_offer(
        &mut self,
        peer: &dyn SignalingPeer,
        path: &str,
        contact: ContactHandle,
        properties: &PropertyBundle,
    ) -> BridgeResult<ParsedOffer> {
        self.discard_stale();

        let media_type = self.media_type.ok_or_else(|| BridgeError::InvalidState {
            expected: "session".to_string(),
            actual: "no session".to_string(),
        })?;
        validate_object_path(path)?;

        let description: MediaDescription = decode(interface::MEDIA_DESCRIPTION, properties)?;
        let offered = description
            .codecs
            .as_deref()
            .ok_or_else(|| BridgeError::ProtocolViolation {
                message: "MediaDescription does not contain codecs".to_string(),
            })?;

        self.current_has_rtcp_fb = description.has_interface(interface::RTCP_FEEDBACK);
        self.current_has_rtp_hdrext = description.has_interface(interface::RTP_HEADER_EXTENSIONS);

        let (does_avpf, feedback) = if self.current_has_rtcp_fb {
            (
                description.does_avpf.unwrap_or(false),
                description.feedback_messages.as_ref(),
            )
        } else {
            (false, None)
        };
        let header_extensions = self.current_has_rtp_hdrext.then(|| {
            engine_header_extensions(description.header_extensions.as_deref().unwrap_or_default())
        });

        info!("New media description {} from contact {}", path, contact);
        let codecs = engine_codecs(media_type, offered, does_avpf, feedback);
        self.negotiated_once = true;

        Ok(ParsedOffer {
            proxy: peer.media_description_proxy(path),
            contact,
            codecs,
            header_extensions,
        })
    }

    /// Keep an offer until the stream for its contact exists
    pub fn park(&mut self, offer: ParsedOffer) {
        debug!(
            "Parking offer {} until a stream for contact {} exists",
            offer.proxy.path(),
            offer.contact
        );
        self.pending_offer = Some(offer);
    }

    /// Take the parked offer if it targets `contact`
    pub fn take_pending_for(&mut self, contact: ContactHandle) -> Option<ParsedOffer> {
        match &self.pending_offer {
            Some(offer) if offer.contact == contact => self.pending_offer.take(),
            _ => None,
        }
    }

    /// Whether an offer is parked
    pub fn has_pending(&self) -> bool {
        self.pending_offer.is_some()
    }

    /// Whether an applied offer still waits for its answer
    pub fn has_open_offer(&self) -> bool {
        self.open_offer.is_some()
    }

    /// Push offered codecs into `stream`
    pub fn apply_to_stream(
        &mut self,
        peer: &dyn SignalingPeer,
        stream: &Arc<dyn EngineStream>,
        offer: ParsedOffer,
    ) -> ApplyOutcome {
        let ParsedOffer {
            proxy,
            codecs,
            header_extensions,
            ..
        } = offer;

        let mut first_remote_codecs = false;
        if !codecs.is_empty() {
            let previous = stream.rtp_header_extensions();
            if previous.is_some() {
                stream.set_rtp_header_extensions(header_extensions.unwrap_or_default());
            }

            if let Err(e) = stream.set_remote_codecs(&codecs) {
                if let Some(previous) = previous {
                    stream.set_rtp_header_extensions(previous);
                }
                warn!("Rejecting offer {}: {}", proxy.path(), e);
                peer.reject_media_description(proxy);
                return ApplyOutcome::Rejected {
                    reason: e.to_string(),
                };
            }

            first_remote_codecs = !self.remote_codecs_set;
            self.remote_codecs_set = true;
        }

        self.open_offer = Some(proxy);
        ApplyOutcome::Applied {
            first_remote_codecs,
        }
    }

    /// Answer the open offer or publish changed local codecs
    pub fn try_sending_local_codecs(&mut self, ctx: &NegotiationContext<'_>) -> SendOutcome {
        if self.pending_offer.is_some() {
            debug!("Not sending codecs while an offer is pending");
            return SendOutcome::Deferred;
        }

        let kind = if ctx.local_sending {
            CodecListKind::Full
        } else {
            CodecListKind::WithoutConfig
        };
        let Some(codecs) = ctx.session.codecs(kind) else {
            debug!("Session has no {} yet", kind.property_name());
            return SendOutcome::NoCodecs;
        };

        let resend = match &self.last_sent_codecs {
            Some(last) if codec_lists_equal(last, &codecs) => return SendOutcome::Unchanged,
            Some(last) => ctx.session.codecs_need_resend(last, &codecs),
            None => Vec::new(),
        };

        if self.open_offer.is_none() && resend.is_empty() {
            return SendOutcome::NothingToSend;
        }

        let open = self.open_offer.is_some();
        let with_hdrext = (open && self.current_has_rtp_hdrext) || self.has_rtp_hdrext;
        let with_rtcp_fb = (open && self.current_has_rtcp_fb) || self.has_rtcp_fb;
        let description = local_description(
            &codecs,
            &resend,
            with_hdrext.then(|| ctx.session.rtp_header_extensions()),
            with_rtcp_fb,
            ctx.default_reporting_interval,
        );

        let outcome = match self.open_offer.take() {
            Some(offer) => {
                info!("Accepting offer {} with {} codecs", offer.path(), codecs.len());
                ctx.peer.accept_media_description(offer, description);
                SendOutcome::Accepted
            }
            None => {
                info!("Updating local media description of {}", ctx.content);
                ctx.peer
                    .update_local_media_description(ctx.content, NO_CONTACT, description);
                SendOutcome::Updated
            }
        };

        self.last_sent_codecs = Some(codecs);
        self.has_rtp_hdrext = self.current_has_rtp_hdrext;
        self.has_rtcp_fb = self.current_has_rtcp_fb;
        outcome
    }

    /// Whether remote codecs were applied at least once
    pub fn remote_codecs_set(&self) -> bool {
        self.remote_codecs_set
    }

    /// Codecs last sent to the peer
    pub fn last_sent_codecs(&self) -> Option<&[Codec]> {
        self.last_sent_codecs.as_deref()
    }

    /// Release every offer handle
    pub fn dispose(&mut self) {
        self.discard_stale();
        self.disposed = true;
    }
}
