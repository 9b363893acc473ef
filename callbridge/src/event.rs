//! Event system for channel and content notifications

use callbridge_core::{
    ContactHandle, ContentFailure, ConferenceObserver, EngineConference, MediaType, ObjectId,
    SourceOutput,
};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Notifications for the embedding application
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// An engine conference was created and should be added to the pipeline
    ConferenceAdded {
        /// Channel owning the conference
        channel: String,
        /// Conference type
        conference_type: String,
        /// Conference identity
        conference: ObjectId,
    },
    /// An engine conference lost its last user and should be removed
    ConferenceRemoved {
        /// Channel owning the conference
        channel: String,
        /// Conference type
        conference_type: String,
        /// Conference identity
        conference: ObjectId,
    },
    /// A content finished initialisation
    ContentReady {
        /// Content path
        content: String,
        /// Media type
        media_type: MediaType,
    },
    /// A content could not be initialised
    ContentInitFailed {
        /// Content path
        content: String,
        /// Error code
        error_code: String,
        /// Error message
        message: String,
    },
    /// A content was reported failed to the peer
    ContentFailed {
        /// Content path
        content: String,
        /// Failure sent to the peer
        failure: ContentFailure,
    },
    /// The peer asked for a new video resolution
    ResolutionChanged {
        /// Content path
        content: String,
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// The peer asked for a new framerate
    FramerateChanged {
        /// Content path
        content: String,
        /// Frames per second
        framerate: u32,
    },
    /// The local source should be restarted with new settings
    RestartSource {
        /// Content path
        content: String,
    },
    /// A stream exposed a decoded output
    SourceOutputAdded {
        /// Content path
        content: String,
        /// Contact the media comes from
        handle: ContactHandle,
        /// Engine stream
        stream: ObjectId,
        /// New output
        output: SourceOutput,
    },
    /// The call was hung up because of an engine error
    ChannelHungUp {
        /// Channel path
        channel: String,
    },
}

impl BridgeEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            BridgeEvent::ConferenceAdded { .. } => "conference_added",
            BridgeEvent::ConferenceRemoved { .. } => "conference_removed",
            BridgeEvent::ContentReady { .. } => "content_ready",
            BridgeEvent::ContentInitFailed { .. } => "content_init_failed",
            BridgeEvent::ContentFailed { .. } => "content_failed",
            BridgeEvent::ResolutionChanged { .. } => "resolution_changed",
            BridgeEvent::FramerateChanged { .. } => "framerate_changed",
            BridgeEvent::RestartSource { .. } => "restart_source",
            BridgeEvent::SourceOutputAdded { .. } => "source_output_added",
            BridgeEvent::ChannelHungUp { .. } => "channel_hung_up",
        }
    }

    /// Content the event is about, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            BridgeEvent::ContentReady { content, .. }
            | BridgeEvent::ContentInitFailed { content, .. }
            | BridgeEvent::ContentFailed { content, .. }
            | BridgeEvent::ResolutionChanged { content, .. }
            | BridgeEvent::FramerateChanged { content, .. }
            | BridgeEvent::RestartSource { content }
            | BridgeEvent::SourceOutputAdded { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Check if this is a video control event
    pub fn is_video_event(&self) -> bool {
        matches!(
            self,
            BridgeEvent::ResolutionChanged { .. }
                | BridgeEvent::FramerateChanged { .. }
                | BridgeEvent::RestartSource { .. }
        )
    }

    /// Check if this reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BridgeEvent::ContentInitFailed { .. }
                | BridgeEvent::ContentFailed { .. }
                | BridgeEvent::ChannelHungUp { .. }
        )
    }
}

/// Create a connected sender and stream
pub fn event_channel() -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventStream::new(rx))
}

/// Cloneable emitter shared by channels, contents and streams
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventSender {
    /// Emit an event; dropped silently once the stream is gone
    pub fn emit(&self, event: BridgeEvent) {
        debug!("Emitting event: {}", event.event_type());
        let _ = self.tx.send(event);
    }

    /// Whether the receiving side still exists
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Stream of bridge events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<BridgeEvent>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<BridgeEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<BridgeEvent> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<BridgeEvent>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Every event queued right now
    pub fn drain(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Stream for EventStream {
    type Item = BridgeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Reports conference lifetime of one channel as events
#[derive(Debug)]
pub struct ConferenceEvents {
    channel: String,
    events: EventSender,
}

impl ConferenceEvents {
    /// Observer emitting on `events` on behalf of `channel`
    pub fn new(channel: impl Into<String>, events: EventSender) -> Arc<Self> {
        Arc::new(Self {
            channel: channel.into(),
            events,
        })
    }
}

impl ConferenceObserver for ConferenceEvents {
    fn conference_added(&self, conference: &Arc<dyn EngineConference>) {
        self.events.emit(BridgeEvent::ConferenceAdded {
            channel: self.channel.clone(),
            conference_type: conference.conference_type(),
            conference: conference.id(),
        });
    }

    fn conference_removed(&self, conference: &Arc<dyn EngineConference>) {
        self.events.emit(BridgeEvent::ConferenceRemoved {
            channel: self.channel.clone(),
            conference_type: conference.conference_type(),
            conference: conference.id(),
        });
    }
}
