//! Reference-counted registries for shared engine objects
//!
//! One conference exists per conference type and one participant per
//! (conference, contact) pair no matter how many contents or streams use
//! them. Callers receive a lease token from `acquire` and hand it back to
//! `release`; the object is torn down when the last lease comes back.

use crate::engine::{EngineConference, EngineParticipant, MediaEngine};
use crate::error::{BridgeError, BridgeResult};
use crate::types::{ContactHandle, ObjectId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryMetrics {
    /// Number of objects created
    pub total_created: u64,
    /// Number of acquisitions served by an existing object
    pub reused: u64,
    /// Number of objects torn down
    pub destroyed: u64,
    /// Number of releases that matched no live entry
    pub unmatched_releases: u64,
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    use_count: u32,
}

/// Result of returning a lease to an arena
#[derive(Debug)]
pub enum Release<V> {
    /// Other holders remain
    Retained {
        /// Remaining holders
        use_count: u32,
    },
    /// Last holder gone, the value is handed back for teardown
    Destroyed(V),
    /// No entry for this slot
    Unmatched,
}

/// Keyed use-counted storage
#[derive(Debug)]
pub struct RefArena<K, V> {
    entries: HashMap<u64, Entry<K, V>>,
    next_slot: u64,
    metrics: RegistryMetrics,
}

impl<K, V> Default for RefArena<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_slot: 1,
            metrics: RegistryMetrics::default(),
        }
    }
}

impl<K: PartialEq + Debug, V: Clone> RefArena<K, V> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference on the entry for `key`, creating it with `create` if absent.
    ///
    /// Returns the slot, the value and whether it was created.
    pub fn acquire_with<E>(
        &mut self,
        key: K,
        create: impl FnOnce() -> Result<V, E>,
    ) -> Result<(u64, V, bool), E> {
        if let Some((slot, entry)) = self.entries.iter_mut().find(|(_, e)| e.key == key) {
            entry.use_count += 1;
            self.metrics.reused += 1;
            return Ok((*slot, entry.value.clone(), false));
        }

        let value = create()?;
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.insert(
            slot,
            Entry {
                key,
                value: value.clone(),
                use_count: 1,
            },
        );
        self.metrics.total_created += 1;
        Ok((slot, value, true))
    }

    /// Drop one reference on a slot
    pub fn release(&mut self, slot: u64) -> Release<V> {
        let Some(entry) = self.entries.get_mut(&slot) else {
            self.metrics.unmatched_releases += 1;
            return Release::Unmatched;
        };

        entry.use_count -= 1;
        if entry.use_count > 0 {
            return Release::Retained {
                use_count: entry.use_count,
            };
        }

        self.metrics.destroyed += 1;
        match self.entries.remove(&slot) {
            Some(entry) => Release::Destroyed(entry.value),
            None => Release::Unmatched,
        }
    }

    /// Count a release that could not even be attributed to a slot
    pub fn record_unmatched(&mut self) {
        self.metrics.unmatched_releases += 1;
    }

    /// First value matching a predicate
    pub fn find(&self, predicate: impl Fn(&K, &V) -> bool) -> Option<&V> {
        self.entries
            .values()
            .find(|e| predicate(&e.key, &e.value))
            .map(|e| &e.value)
    }

    /// Holders of `key`, 0 when absent
    pub fn use_count(&self, key: &K) -> u32 {
        self.entries
            .values()
            .find(|e| e.key == *key)
            .map_or(0, |e| e.use_count)
    }

    /// Live values
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values().map(|e| &e.value)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry is live
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> RegistryMetrics {
        self.metrics.clone()
    }
}

/// Notified when conferences come and go
pub trait ConferenceObserver: Send + Sync + Debug {
    /// A conference was instantiated
    fn conference_added(&self, conference: &Arc<dyn EngineConference>);

    /// A conference lost its last holder
    fn conference_removed(&self, conference: &Arc<dyn EngineConference>);
}

/// Proof of one reference on a conference
#[derive(Debug)]
pub struct ConferenceLease {
    registry: ObjectId,
    slot: u64,
    conference: Arc<dyn EngineConference>,
}

impl ConferenceLease {
    /// The leased conference
    pub fn conference(&self) -> &Arc<dyn EngineConference> {
        &self.conference
    }
}

/// One conference per conference type
#[derive(Debug)]
pub struct ConferenceRegistry {
    id: ObjectId,
    arena: RefArena<String, Arc<dyn EngineConference>>,
    observer: Option<Arc<dyn ConferenceObserver>>,
}

/// Conference registry shared by every content of a call
pub type SharedConferences = Arc<Mutex<ConferenceRegistry>>;

impl Default for ConferenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConferenceRegistry {
    /// Create a registry without an observer
    pub fn new() -> Self {
        Self {
            id: ObjectId::next(),
            arena: RefArena::new(),
            observer: None,
        }
    }

    /// Create a registry reporting additions and removals to `observer`
    pub fn with_observer(observer: Arc<dyn ConferenceObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new()
        }
    }

    /// Get the conference for `conference_type`, creating it on first use
    pub fn acquire(
        &mut self,
        engine: &dyn MediaEngine,
        conference_type: &str,
    ) -> BridgeResult<ConferenceLease> {
        let (slot, conference, created) = self
            .arena
            .acquire_with(conference_type.to_string(), || {
                engine.create_conference(conference_type)
            })
            .map_err(|e| BridgeError::ConferenceUnavailable {
                conference_type: conference_type.to_string(),
                reason: e.to_string(),
            })?;

        if created {
            info!("Created {} conference {}", conference_type, conference.id());
            if let Some(observer) = &self.observer {
                observer.conference_added(&conference);
            }
        } else {
            debug!(
                "Reusing {} conference {} ({} holders)",
                conference_type,
                conference.id(),
                self.arena.use_count(&conference_type.to_string())
            );
        }

        Ok(ConferenceLease {
            registry: self.id,
            slot,
            conference,
        })
    }

    /// Return a lease; the conference is dropped with its last holder
    pub fn release(&mut self, lease: ConferenceLease) {
        if lease.registry != self.id {
            warn!(
                "Releasing conference {} that was not acquired from this registry",
                lease.conference.id()
            );
            self.arena.record_unmatched();
            return;
        }

        match self.arena.release(lease.slot) {
            Release::Destroyed(conference) => {
                info!(
                    "Removed {} conference {}",
                    conference.conference_type(),
                    conference.id()
                );
                if let Some(observer) = &self.observer {
                    observer.conference_removed(&conference);
                }
            }
            Release::Retained { use_count } => {
                debug!(
                    "Conference {} still has {} holders",
                    lease.conference.id(),
                    use_count
                );
            }
            Release::Unmatched => {
                warn!(
                    "Releasing conference {} with no live registry entry",
                    lease.conference.id()
                );
            }
        }
    }

    /// Look up a live conference by bus identity
    pub fn find_by_id(&self, id: ObjectId) -> Option<Arc<dyn EngineConference>> {
        self.arena.find(|_, c| c.id() == id).cloned()
    }

    /// Live conferences
    pub fn conferences(&self) -> Vec<Arc<dyn EngineConference>> {
        self.arena.values().cloned().collect()
    }

    /// Holders of the conference for `conference_type`
    pub fn use_count(&self, conference_type: &str) -> u32 {
        self.arena.use_count(&conference_type.to_string())
    }

    /// Number of live conferences
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether no conference is live
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> RegistryMetrics {
        self.arena.metrics()
    }
}

/// Proof of one reference on a participant
#[derive(Debug)]
pub struct ParticipantLease {
    registry: ObjectId,
    slot: u64,
    handle: ContactHandle,
    participant: Arc<dyn EngineParticipant>,
}

impl ParticipantLease {
    /// The leased participant
    pub fn participant(&self) -> &Arc<dyn EngineParticipant> {
        &self.participant
    }

    /// Contact the participant represents
    pub fn handle(&self) -> ContactHandle {
        self.handle
    }
}

/// One participant per (conference, contact)
#[derive(Debug)]
pub struct ParticipantRegistry {
    id: ObjectId,
    arena: RefArena<(ObjectId, ContactHandle), Arc<dyn EngineParticipant>>,
}

/// Participant registry shared by every content of a call
pub type SharedParticipants = Arc<Mutex<ParticipantRegistry>>;

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            id: ObjectId::next(),
            arena: RefArena::new(),
        }
    }

    /// Get the participant for `handle` in `conference`, creating it on first use
    pub fn acquire(
        &mut self,
        conference: &Arc<dyn EngineConference>,
        handle: ContactHandle,
    ) -> BridgeResult<ParticipantLease> {
        let (slot, participant, created) = self
            .arena
            .acquire_with((conference.id(), handle), || conference.new_participant())
            .map_err(|e| BridgeError::ParticipantUnavailable {
                handle,
                reason: e.to_string(),
            })?;

        if created {
            debug!(
                "Created participant {} for handle {} in conference {}",
                participant.id(),
                handle,
                conference.id()
            );
        }

        Ok(ParticipantLease {
            registry: self.id,
            slot,
            handle,
            participant,
        })
    }

    /// Return a lease; the participant is dropped with its last holder
    pub fn release(&mut self, lease: ParticipantLease) {
        if lease.registry != self.id {
            warn!(
                "Releasing participant for handle {} that was not acquired from this registry",
                lease.handle
            );
            self.arena.record_unmatched();
            return;
        }

        match self.arena.release(lease.slot) {
            Release::Destroyed(participant) => {
                debug!(
                    "Removed participant {} for handle {}",
                    participant.id(),
                    lease.handle
                );
            }
            Release::Retained { .. } => {}
            Release::Unmatched => {
                warn!(
                    "Releasing participant for handle {} with no live registry entry",
                    lease.handle
                );
            }
        }
    }

    /// Holders of the participant for (`conference`, `handle`)
    pub fn use_count(&self, conference: ObjectId, handle: ContactHandle) -> u32 {
        self.arena.use_count(&(conference, handle))
    }

    /// Number of live participants
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether no participant is live
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> RegistryMetrics {
        self.arena.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_shares_entries_by_key() {
        let mut arena: RefArena<&str, u32> = RefArena::new();
        let (a, _, created_a) = arena.acquire_with::<()>("rtp", || Ok(1)).unwrap();
        let (b, value, created_b) = arena.acquire_with::<()>("rtp", || Ok(2)).unwrap();

        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a, b);
        assert_eq!(value, 1);
        assert_eq!(arena.use_count(&"rtp"), 2);

        assert!(matches!(arena.release(a), Release::Retained { use_count: 1 }));
        assert!(matches!(arena.release(b), Release::Destroyed(1)));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_arena_failed_creation_leaves_no_entry() {
        let mut arena: RefArena<&str, u32> = RefArena::new();
        let result = arena.acquire_with("raw", || Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(arena.is_empty());
        assert_eq!(arena.metrics().total_created, 0);
    }

    #[test]
    fn test_arena_unmatched_release_is_counted() {
        let mut arena: RefArena<&str, u32> = RefArena::new();
        assert!(matches!(arena.release(42), Release::Unmatched));
        assert_eq!(arena.metrics().unmatched_releases, 1);
    }
}
