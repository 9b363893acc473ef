//! Top-level bridge owning every call channel
//!
//! All channels share the engine bus. A bus message is offered to each
//! channel in turn and the first one owning its origin claims it.

use crate::channel::CallChannel;
use crate::config::BridgeConfig;
use crate::event::{event_channel, EventSender, EventStream};
use callbridge_core::{
    BridgeError, BridgeResult, BusDispatcher, BusOutcome, EngineMessage, MediaEngine,
};
use callbridge_diagnostics::BusTrace;
use callbridge_signaling::{PeerEvent, SignalingPeer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Item delivered to a running bridge
#[derive(Debug)]
pub enum BridgeInput {
    /// Notification from the peer of `channel`
    Peer {
        /// Channel path
        channel: String,
        /// Notification
        event: PeerEvent,
    },
    /// Message from the engine bus
    Engine(EngineMessage),
    /// Dispose every channel and stop
    Shutdown,
}

/// Every call handled by one engine
#[derive(Debug)]
pub struct Bridge {
    engine: Arc<dyn MediaEngine>,
    config: Arc<BridgeConfig>,
    events: EventSender,
    channels: BusDispatcher<String, CallChannel>,
    trace: BusTrace,
}

impl Bridge {
    /// Create a bridge and the stream of its events
    pub fn new(engine: Arc<dyn MediaEngine>, config: BridgeConfig) -> (Self, EventStream) {
        let (events, stream) = event_channel();
        let trace = BusTrace::new(config.bus_trace_capacity);
        let bridge = Self {
            engine,
            config: Arc::new(config),
            events,
            channels: BusDispatcher::new(),
            trace,
        };
        (bridge, stream)
    }

    /// Take over the call channel at `path` and start it
    pub fn add_channel(&mut self, path: &str, peer: Arc<dyn SignalingPeer>) -> BridgeResult<()> {
        let key = path.to_string();
        if self.channels.contains(&key) {
            return Err(BridgeError::InvalidState {
                expected: "new channel".to_string(),
                actual: format!("{} already handled", path),
            });
        }

        info!("Handling call channel {}", path);
        let mut channel = CallChannel::new(
            key.clone(),
            peer,
            self.engine.clone(),
            self.config.clone(),
            self.events.clone(),
        );
        channel.start();
        self.channels.insert(key, channel);
        Ok(())
    }

    /// Dispose and forget a channel; false when it was unknown
    pub fn remove_channel(&mut self, path: &str) -> bool {
        match self.channels.remove(&path.to_string()) {
            Some(mut channel) => {
                info!("Dropping call channel {}", path);
                channel.dispose();
                true
            }
            None => false,
        }
    }

    /// Channel by path
    pub fn channel(&self, path: &str) -> Option<&CallChannel> {
        self.channels.get(&path.to_string())
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver a peer notification to its channel
    pub fn handle_peer_event(&mut self, channel: &str, event: PeerEvent) {
        match self.channels.get_mut(&channel.to_string()) {
            Some(target) => target.handle_peer_event(event),
            None => debug!("No channel {} for {}", channel, event.event_type()),
        }
    }

    /// Offer an engine bus message to the channels
    pub fn handle_bus_message(&mut self, message: &EngineMessage) -> BusOutcome {
        let outcome = self.channels.dispatch(message);
        self.trace.record(message, outcome);
        if !outcome.is_handled() {
            debug!("Nobody handled {} from {}", message.kind_name(), message.origin);
        }
        outcome
    }

    /// Recent bus routing decisions
    pub fn trace(&self) -> &BusTrace {
        &self.trace
    }

    /// Configuration in use
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Dispose every channel
    pub fn shutdown(&mut self) {
        for (path, mut channel) in self.channels.drain() {
            debug!("Shutting down channel {}", path);
            channel.dispose();
        }
    }

    /// Process inputs in arrival order until shutdown or the inbox closes
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<BridgeInput>) -> Self {
        while let Some(input) = inbox.recv().await {
            match input {
                BridgeInput::Peer { channel, event } => self.handle_peer_event(&channel, event),
                BridgeInput::Engine(message) => {
                    self.handle_bus_message(&message);
                }
                BridgeInput::Shutdown => break,
            }
        }
        self.shutdown();
        self
    }
}
