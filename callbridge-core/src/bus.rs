//! Engine bus messages and first-match routing
//!
//! The engine posts every notification to one shared bus. A message is
//! offered to a fixed-order list of handlers; the first handler that claims
//! it stops the walk.

use crate::codec::Codec;
use crate::engine::SourceOutput;
use crate::types::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// How a telephony event is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DtmfMethod {
    /// RFC 4733 named events
    RtpEvent,
    /// In-band audio tones
    Sound,
    /// Engine picks
    Auto,
}

/// Payload of a bus message
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessageKind {
    /// Conference-level warning
    Warning {
        /// Warning text
        message: String,
        /// Debug details
        debug: Option<String>,
    },
    /// Conference-level error
    Error {
        /// Error text
        message: String,
        /// Debug details
        debug: Option<String>,
    },
    /// A session failed
    SessionError {
        /// Failing session
        session: ObjectId,
        /// Engine error code
        code: i32,
        /// Error text
        message: String,
    },
    /// A session's local codecs changed
    CodecsChanged {
        /// Session
        session: ObjectId,
    },
    /// A telephony event started playing
    TelephonyEventStarted {
        /// Session
        session: ObjectId,
        /// Carrier method
        method: DtmfMethod,
        /// Event code
        event: u8,
        /// Volume
        volume: u8,
    },
    /// The active telephony event stopped
    TelephonyEventStopped {
        /// Session
        session: ObjectId,
        /// Carrier method
        method: DtmfMethod,
    },
    /// The codec used for sending changed
    SendCodecChanged {
        /// Session
        session: ObjectId,
        /// Primary send codec
        codec: Codec,
        /// Secondary codecs, e.g. telephone-event
        secondary_codecs: Vec<Codec>,
    },
    /// A stream failed
    StreamError {
        /// Failing stream
        stream: ObjectId,
        /// Engine error code
        code: i32,
        /// Error text
        message: String,
    },
    /// A stream's receive codecs changed
    RecvCodecsChanged {
        /// Stream
        stream: ObjectId,
        /// Codecs now being received
        codecs: Vec<Codec>,
    },
    /// A stream exposed a new decoded output
    SourceOutputAdded {
        /// Stream
        stream: ObjectId,
        /// New output
        output: SourceOutput,
    },
}

/// Message posted on the engine bus
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMessage {
    /// Conference (or other top-level object) that posted the message
    pub origin: ObjectId,
    /// Payload
    pub kind: EngineMessageKind,
}

impl EngineMessage {
    /// Create a message
    pub fn new(origin: ObjectId, kind: EngineMessageKind) -> Self {
        Self { origin, kind }
    }

    /// Short stable name of the payload, for logs and traces
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            EngineMessageKind::Warning { .. } => "warning",
            EngineMessageKind::Error { .. } => "error",
            EngineMessageKind::SessionError { .. } => "session-error",
            EngineMessageKind::CodecsChanged { .. } => "codecs-changed",
            EngineMessageKind::TelephonyEventStarted { .. } => "telephony-event-started",
            EngineMessageKind::TelephonyEventStopped { .. } => "telephony-event-stopped",
            EngineMessageKind::SendCodecChanged { .. } => "send-codec-changed",
            EngineMessageKind::StreamError { .. } => "stream-error",
            EngineMessageKind::RecvCodecsChanged { .. } => "recv-codecs-changed",
            EngineMessageKind::SourceOutputAdded { .. } => "src-output-added",
        }
    }
}

/// Routing verdict for a bus message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusOutcome {
    /// A handler claimed the message
    Handled,
    /// Nobody claimed the message
    Unhandled,
}

impl BusOutcome {
    /// Whether the message was claimed
    pub fn is_handled(self) -> bool {
        matches!(self, BusOutcome::Handled)
    }
}

/// Something that may claim bus messages
pub trait BusHandler {
    /// Inspect a message and report whether it was claimed
    fn handle_bus_message(&mut self, message: &EngineMessage) -> BusOutcome;
}

/// Insertion-ordered table of keyed handlers with first-match dispatch
#[derive(Debug)]
pub struct BusDispatcher<K, H> {
    routes: Vec<(K, H)>,
}

impl<K, H> Default for BusDispatcher<K, H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<K: PartialEq + Debug, H: BusHandler> BusDispatcher<K, H> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; an existing handler under the same key is returned
    pub fn insert(&mut self, key: K, handler: H) -> Option<H> {
        if let Some(slot) = self.routes.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, handler));
        }
        self.routes.push((key, handler));
        None
    }

    /// Remove a handler, preserving the order of the rest
    pub fn remove(&mut self, key: &K) -> Option<H> {
        let index = self.routes.iter().position(|(k, _)| k == key)?;
        Some(self.routes.remove(index).1)
    }

    /// Borrow a handler
    pub fn get(&self, key: &K) -> Option<&H> {
        self.routes.iter().find(|(k, _)| k == key).map(|(_, h)| h)
    }

    /// Mutably borrow a handler
    pub fn get_mut(&mut self, key: &K) -> Option<&mut H> {
        self.routes
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, h)| h)
    }

    /// Whether a key is routed
    pub fn contains(&self, key: &K) -> bool {
        self.routes.iter().any(|(k, _)| k == key)
    }

    /// Number of handlers
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Keys in dispatch order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.routes.iter().map(|(k, _)| k)
    }

    /// Handlers in dispatch order
    pub fn values(&self) -> impl Iterator<Item = &H> {
        self.routes.iter().map(|(_, h)| h)
    }

    /// Mutable handlers in dispatch order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut H> {
        self.routes.iter_mut().map(|(_, h)| h)
    }

    /// Remove every handler, in dispatch order
    pub fn drain(&mut self) -> Vec<(K, H)> {
        std::mem::take(&mut self.routes)
    }

    /// Offer a message to each handler in order until one claims it
    pub fn dispatch(&mut self, message: &EngineMessage) -> BusOutcome {
        dispatch_first(self.values_mut(), message)
    }
}

/// Offer a message to handlers in order; stop at the first that claims it
pub fn dispatch_first<'a, I, H>(handlers: I, message: &EngineMessage) -> BusOutcome
where
    I: IntoIterator<Item = &'a mut H>,
    H: BusHandler + ?Sized + 'a,
{
    for handler in handlers {
        if handler.handle_bus_message(message).is_handled() {
            return BusOutcome::Handled;
        }
    }
    BusOutcome::Unhandled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Claims {
        origin: ObjectId,
        seen: usize,
    }

    impl BusHandler for Claims {
        fn handle_bus_message(&mut self, message: &EngineMessage) -> BusOutcome {
            self.seen += 1;
            if message.origin == self.origin {
                BusOutcome::Handled
            } else {
                BusOutcome::Unhandled
            }
        }
    }

    fn warning(origin: ObjectId) -> EngineMessage {
        EngineMessage::new(
            origin,
            EngineMessageKind::Warning {
                message: "late buffer".to_string(),
                debug: None,
            },
        )
    }

    #[test]
    fn test_first_match_stops_walk() {
        let target = ObjectId::next();
        let mut table = BusDispatcher::new();
        table.insert("a", Claims { origin: target, seen: 0 });
        table.insert("b", Claims { origin: target, seen: 0 });

        assert_eq!(table.dispatch(&warning(target)), BusOutcome::Handled);
        assert_eq!(table.get(&"a").unwrap().seen, 1);
        assert_eq!(table.get(&"b").unwrap().seen, 0);
    }

    #[test]
    fn test_unclaimed_message_visits_everyone() {
        let mut table = BusDispatcher::new();
        table.insert(1, Claims { origin: ObjectId::next(), seen: 0 });
        table.insert(2, Claims { origin: ObjectId::next(), seen: 0 });

        assert_eq!(table.dispatch(&warning(ObjectId::next())), BusOutcome::Unhandled);
        assert!(table.values().all(|h| h.seen == 1));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut table = BusDispatcher::new();
        for key in ["x", "y", "z"] {
            table.insert(key, Claims { origin: ObjectId::next(), seen: 0 });
        }
        assert!(table.remove(&"y").is_some());
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec!["x", "z"]);
        assert!(table.remove(&"y").is_none());
    }
}
