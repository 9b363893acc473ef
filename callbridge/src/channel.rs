//! Call channel: the contents of one call and their shared engine objects

use crate::config::BridgeConfig;
use crate::content::{fetched_bundle, CallContent, ContentPhase};
use crate::event::{BridgeEvent, ConferenceEvents, EventSender};
use callbridge_core::{
    BridgeError, BridgeResult, BusDispatcher, BusHandler, BusOutcome, CallStateChangeReason,
    ConferenceRegistry, EngineMessage, EngineMessageKind, MediaEngine, ParticipantRegistry,
    SharedConferences, SharedParticipants,
};
use callbridge_signaling::{
    decode, interface, ChannelProperties, PeerError, PeerEvent, PeerInterface, PropertyBundle,
    SignalKind, SignalingPeer,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Engine objects shared by every content of one call
#[derive(Debug, Clone)]
pub struct CallResources {
    /// Engine creating conferences
    pub engine: Arc<dyn MediaEngine>,
    /// Conferences by packetization
    pub conferences: SharedConferences,
    /// Participants by conference and contact
    pub participants: SharedParticipants,
}

impl CallResources {
    /// Fresh registries for the call on `channel`, reporting conferences as events
    pub fn new(engine: Arc<dyn MediaEngine>, channel: &str, events: &EventSender) -> Self {
        let observer = ConferenceEvents::new(channel, events.clone());
        Self {
            engine,
            conferences: Arc::new(Mutex::new(ConferenceRegistry::with_observer(observer))),
            participants: Arc::new(Mutex::new(ParticipantRegistry::new())),
        }
    }
}

/// Item delivered to a running channel
#[derive(Debug)]
pub enum ChannelInput {
    /// Notification from the signaling peer
    Peer(PeerEvent),
    /// Message from the engine bus
    Engine(EngineMessage),
}

/// One call and its contents
#[derive(Debug)]
pub struct CallChannel {
    path: String,
    peer: Arc<dyn SignalingPeer>,
    resources: CallResources,
    config: Arc<BridgeConfig>,
    events: EventSender,
    contents: Option<BusDispatcher<String, CallContent>>,
    started: bool,
    disposed: bool,
}

impl CallChannel {
    /// Channel at `path` talking to `peer`
    pub fn new(
        path: impl Into<String>,
        peer: Arc<dyn SignalingPeer>,
        engine: Arc<dyn MediaEngine>,
        config: Arc<BridgeConfig>,
        events: EventSender,
    ) -> Self {
        let path = path.into();
        let resources = CallResources::new(engine, &path, &events);
        Self {
            path,
            peer,
            resources,
            config,
            events,
            contents: None,
            started: false,
            disposed: false,
        }
    }

    /// Ask the peer for the channel properties
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.peer.fetch_properties(&self.path, PeerInterface::Channel);
    }

    /// Route a peer notification to the channel or the content it concerns
    pub fn handle_peer_event(&mut self, event: PeerEvent) {
        if self.disposed {
            debug!("Ignoring {} on disposed channel {}", event.event_type(), self.path);
            return;
        }

        match event {
            PeerEvent::PropertiesFetched {
                object_path,
                interface: PeerInterface::Channel,
                result,
            } if object_path == self.path => self.on_channel_properties(result),
            PeerEvent::ContentAdded { content } => {
                if self.contents.is_none() {
                    debug!("Ignoring content {} before the channel properties", content);
                    return;
                }
                self.add_content(content);
            }
            PeerEvent::ContentRemoved { content } => self.remove_content(&content),
            event => {
                let target = match &event {
                    PeerEvent::PropertiesFetched { object_path, .. } => {
                        self.content_for(object_path)
                    }
                    PeerEvent::LocalSendingStateChanged { stream, .. } => self.content_for(stream),
                    other => other.content_path().map(str::to_string),
                };
                let Some(path) = target else {
                    debug!("No content for {} on {}", event.event_type(), self.path);
                    return;
                };
                match self.contents.as_mut().and_then(|c| c.get_mut(&path)) {
                    Some(content) => content.handle_peer_event(event),
                    None => debug!("Content {} is not known to {}", path, self.path),
                }
            }
        }
    }

    fn content_for(&self, object_path: &str) -> Option<String> {
        self.contents
            .as_ref()?
            .values()
            .find(|c| c.path() == object_path || c.owns_stream(object_path))
            .map(|c| c.path().to_string())
    }

    fn on_channel_properties(&mut self, result: Result<PropertyBundle, PeerError>) {
        if self.contents.is_some() {
            return;
        }
        if let Err(err) = self.read_channel_properties(result) {
            warn!("Channel {} setup failed: {}", self.path, err);
            self.hangup();
        }
    }

    fn read_channel_properties(
        &mut self,
        result: Result<PropertyBundle, PeerError>,
    ) -> BridgeResult<()> {
        let bundle = fetched_bundle(interface::CHANNEL, result)?;
        let props: ChannelProperties = decode(interface::CHANNEL, &bundle)?;

        if props.hardware_streaming {
            warn!("Channel {} streams in hardware, ignoring it", self.path);
            return Ok(());
        }

        for signal in [SignalKind::ContentAdded, SignalKind::ContentRemoved] {
            self.peer
                .subscribe(&self.path, signal)
                .map_err(|e| BridgeError::SignalSubscription {
                    signal: signal.to_string(),
                    reason: e.to_string(),
                })?;
        }

        info!("Channel {} has {} contents", self.path, props.contents.len());
        self.contents = Some(BusDispatcher::new());
        for content in props.contents {
            if !self.add_content(content) {
                break;
            }
        }
        Ok(())
    }

    fn add_content(&mut self, path: String) -> bool {
        let Some(contents) = self.contents.as_mut() else {
            return false;
        };
        if contents.contains(&path) {
            debug!("Content {} already known", path);
            return true;
        }

        let mut content = CallContent::new(
            path.clone(),
            self.peer.clone(),
            self.resources.clone(),
            self.config.clone(),
            self.events.clone(),
        );
        content.start();
        if content.phase() == ContentPhase::Failed {
            return false;
        }
        contents.insert(path, content);
        true
    }

    fn remove_content(&mut self, path: &str) {
        let Some(contents) = self.contents.as_mut() else {
            return;
        };
        if let Some(mut content) = contents.remove(&path.to_string()) {
            info!("Removing content {} from {}", path, self.path);
            content.dispose();
        }
    }

    /// Hang up the call
    pub fn hangup(&self) {
        self.peer
            .hangup(&self.path, CallStateChangeReason::Unknown, "", "");
        self.events.emit(BridgeEvent::ChannelHungUp {
            channel: self.path.clone(),
        });
    }

    /// Tear down every content
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(mut contents) = self.contents.take() {
            for (_, mut content) in contents.drain() {
                content.dispose();
            }
        }
    }

    /// Process inputs in arrival order until the inbox closes
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<ChannelInput>) {
        self.start();
        while let Some(input) = inbox.recv().await {
            match input {
                ChannelInput::Peer(event) => self.handle_peer_event(event),
                ChannelInput::Engine(message) => {
                    if !self.handle_bus_message(&message).is_handled() {
                        debug!("Unhandled {} on {}", message.kind_name(), self.path);
                    }
                }
            }
        }
        self.dispose();
    }

    /// Object path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Shared engine objects
    pub fn resources(&self) -> &CallResources {
        &self.resources
    }

    /// Content by path
    pub fn content(&self, path: &str) -> Option<&CallContent> {
        self.contents.as_ref()?.get(&path.to_string())
    }

    /// Content paths in creation order; empty before the channel properties
    pub fn content_paths(&self) -> Vec<String> {
        self.contents
            .as_ref()
            .map(|contents| contents.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the contents are known
    pub fn is_ready(&self) -> bool {
        self.contents.is_some()
    }
}

impl BusHandler for CallChannel {
    fn handle_bus_message(&mut self, message: &EngineMessage) -> BusOutcome {
        if self.disposed {
            return BusOutcome::Unhandled;
        }
        if self
            .resources
            .conferences
            .lock()
            .find_by_id(message.origin)
            .is_none()
        {
            return BusOutcome::Unhandled;
        }

        match &message.kind {
            EngineMessageKind::Warning { message: text, debug: details } => {
                warn!("session: {} ({})", text, details.as_deref().unwrap_or(""));
                BusOutcome::Handled
            }
            EngineMessageKind::Error { message: text, debug: details } => {
                warn!("session ERROR: {} ({})", text, details.as_deref().unwrap_or(""));
                self.hangup();
                BusOutcome::Handled
            }
            _ => match self.contents.as_mut() {
                Some(contents) => contents.dispatch(message),
                None => BusOutcome::Unhandled,
            },
        }
    }
}

impl Drop for CallChannel {
    fn drop(&mut self) {
        self.dispose();
    }
}
