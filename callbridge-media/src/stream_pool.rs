//! Per-content pool of engine streams keyed by contact handle
//!
//! The signaling side creates and releases streams; engine streaming threads
//! look them up concurrently. All state sits behind one mutex, and every
//! insertion and removal bumps a generation counter so long-running
//! iterations can notice and resynchronise. Engine calls are never made with the lock held.

use crate::error::{MediaError, MediaResult};
use callbridge_core::{
    ContactHandle, Direction, EngineConference, EngineSession, EngineStream, ObjectId,
    ParticipantLease, SharedParticipants, SourceOutput, TransmitterConfig,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct PooledStream {
    slot: u64,
    handle: ContactHandle,
    use_count: u32,
    stream: Arc<dyn EngineStream>,
    participant: ParticipantLease,
}

#[derive(Debug, Default)]
struct PoolState {
    streams: Vec<PooledStream>,
    generation: u64,
    next_slot: u64,
    disposed: bool,
}

/// Proof of one reference on a pooled stream
#[derive(Debug)]
pub struct StreamLease {
    pool: ObjectId,
    slot: u64,
    handle: ContactHandle,
    stream: Arc<dyn EngineStream>,
}

impl StreamLease {
    /// The leased engine stream
    pub fn stream(&self) -> &Arc<dyn EngineStream> {
        &self.stream
    }

    /// Contact the stream talks to
    pub fn handle(&self) -> ContactHandle {
        self.handle
    }
}

/// Shared, thread-safe stream pool
#[derive(Debug, Clone)]
pub struct StreamPool {
    id: ObjectId,
    participants: SharedParticipants,
    inner: Arc<Mutex<PoolState>>,
}

impl StreamPool {
    /// Create an empty pool drawing participants from `participants`
    pub fn new(participants: SharedParticipants) -> Self {
        Self {
            id: ObjectId::next(),
            participants,
            inner: Arc::new(Mutex::new(PoolState {
                next_slot: 1,
                ..PoolState::default()
            })),
        }
    }

    /// Return the stream for `handle`, creating participant, stream and
    /// transmitter on first use.
    ///
    /// The boolean is true when the stream was created by this call.
    pub fn get_or_create(
        &self,
        session: &Arc<dyn EngineSession>,
        conference: &Arc<dyn EngineConference>,
        handle: ContactHandle,
        transmitter: &TransmitterConfig,
    ) -> MediaResult<(StreamLease, bool)> {
        {
            let mut state = self.inner.lock();
            if state.disposed {
                return Err(MediaError::PoolDisposed);
            }
            if let Some(entry) = state.streams.iter_mut().find(|s| s.handle == handle) {
                entry.use_count += 1;
                debug!(
                    "Reusing stream {} for handle {} ({} holders)",
                    entry.stream.id(),
                    handle,
                    entry.use_count
                );
                return Ok((
                    StreamLease {
                        pool: self.id,
                        slot: entry.slot,
                        handle,
                        stream: entry.stream.clone(),
                    },
                    false,
                ));
            }
        }

        let participant = self
            .participants
            .lock()
            .acquire(conference, handle)
            .map_err(|e| MediaError::ParticipantUnavailable {
                handle,
                reason: e.to_string(),
            })?;

        let stream = match session.new_stream(participant.participant(), Direction::Recv) {
            Ok(stream) => stream,
            Err(source) => {
                self.participants.lock().release(participant);
                return Err(MediaError::StreamCreation { handle, source });
            }
        };

        if let Err(source) = stream.set_transmitter(transmitter) {
            stream.dispose();
            self.participants.lock().release(participant);
            return Err(MediaError::TransmitterRejected {
                transmitter: transmitter.transmitter.clone(),
                source,
            });
        }

        let mut state = self.inner.lock();
        if state.disposed {
            drop(state);
            stream.dispose();
            self.participants.lock().release(participant);
            return Err(MediaError::PoolDisposed);
        }

        let slot = state.next_slot;
        state.next_slot += 1;
        state.generation += 1;
        state.streams.push(PooledStream {
            slot,
            handle,
            use_count: 1,
            stream: stream.clone(),
            participant,
        });
        debug!(
            "Created stream {} for handle {} with transmitter {}",
            stream.id(),
            handle,
            transmitter.transmitter
        );

        Ok((
            StreamLease {
                pool: self.id,
                slot,
                handle,
                stream,
            },
            true,
        ))
    }

    /// Return a lease; the stream is disposed with its last holder
    pub fn put(&self, lease: StreamLease) {
        if lease.pool != self.id {
            warn!(
                "Releasing stream for handle {} that does not belong to this pool",
                lease.handle
            );
            return;
        }

        let removed = {
            let mut state = self.inner.lock();
            let Some(index) = state.streams.iter().position(|s| s.slot == lease.slot) else {
                warn!(
                    "Releasing stream for handle {} that is no longer pooled",
                    lease.handle
                );
                return;
            };

            state.streams[index].use_count -= 1;
            if state.streams[index].use_count > 0 {
                return;
            }
            state.generation += 1;
            state.streams.remove(index)
        };

        debug!(
            "Disposing stream {} for handle {}",
            removed.stream.id(),
            removed.handle
        );
        removed.stream.dispose();
        self.participants.lock().release(removed.participant);
    }

    /// Dispose every stream regardless of holders; later `put`s are ignored
    pub fn dispose(&self) {
        let removed = {
            let mut state = self.inner.lock();
            state.disposed = true;
            state.generation += 1;
            std::mem::take(&mut state.streams)
        };

        for entry in removed {
            entry.stream.dispose();
            self.participants.lock().release(entry.participant);
        }
    }

    /// Stream for `handle` without taking a reference
    pub fn lookup(&self, handle: ContactHandle) -> Option<Arc<dyn EngineStream>> {
        self.inner
            .lock()
            .streams
            .iter()
            .find(|s| s.handle == handle)
            .map(|s| s.stream.clone())
    }

    /// Contact of the pooled stream with bus identity `stream`
    pub fn handle_for_stream(&self, stream: ObjectId) -> Option<ContactHandle> {
        self.inner
            .lock()
            .streams
            .iter()
            .find(|s| s.stream.id() == stream)
            .map(|s| s.handle)
    }

    /// Holders of the stream for `handle`, 0 when absent
    pub fn use_count(&self, handle: ContactHandle) -> u32 {
        self.inner
            .lock()
            .streams
            .iter()
            .find(|s| s.handle == handle)
            .map_or(0, |s| s.use_count)
    }

    /// Number of pooled streams
    pub fn len(&self) -> usize {
        self.inner.lock().streams.len()
    }

    /// Whether the pool holds no stream
    pub fn is_empty(&self) -> bool {
        self.inner.lock().streams.is_empty()
    }

    /// Current generation; changes on every insertion and removal
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Iterate the decoded outputs of the streams for `handles`.
    ///
    /// Safe against concurrent insertion and removal: when the pool changes,
    /// iteration restarts over the requested handles, skipping those whose
    /// outputs were already delivered.
    pub fn iterate_src_outputs(&self, handles: &[ContactHandle]) -> SourceOutputIter {
        let generation = self.generation();
        SourceOutputIter {
            pool: self.clone(),
            requested: handles.to_vec(),
            remaining: handles.iter().copied().collect(),
            delivered: HashSet::new(),
            buffered: VecDeque::new(),
            generation,
            resyncs: 0,
        }
    }
}

/// Iterator over `(handle, output)` pairs, see [`StreamPool::iterate_src_outputs`]
#[derive(Debug)]
pub struct SourceOutputIter {
    pool: StreamPool,
    requested: Vec<ContactHandle>,
    remaining: VecDeque<ContactHandle>,
    delivered: HashSet<ContactHandle>,
    buffered: VecDeque<(ContactHandle, SourceOutput)>,
    generation: u64,
    resyncs: u32,
}

impl SourceOutputIter {
    /// How many times the iteration restarted after a pool change
    pub fn resyncs(&self) -> u32 {
        self.resyncs
    }
}

impl Iterator for SourceOutputIter {
    type Item = (ContactHandle, SourceOutput);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Some(item);
            }

            let stream = {
                let state = self.pool.inner.lock();
                if state.generation != self.generation {
                    self.generation = state.generation;
                    self.resyncs += 1;
                    self.remaining = self
                        .requested
                        .iter()
                        .copied()
                        .filter(|h| !self.delivered.contains(h))
                        .collect();
                    debug!("Stream pool changed, resuming output iteration");
                }

                let handle = self.remaining.pop_front()?;
                let found = state
                    .streams
                    .iter()
                    .find(|s| s.handle == handle)
                    .map(|s| (handle, s.stream.clone()));
                if found.is_some() {
                    self.delivered.insert(handle);
                }
                found
            };

            if let Some((handle, stream)) = stream {
                self.buffered
                    .extend(stream.src_outputs().into_iter().map(|o| (handle, o)));
            }
        }
    }
}
