//! DTMF sending state machine
//!
//! Two sources drive the state: the peer requests a change, and the engine
//! later confirms the tone really started or stopped. [`DtmfMachine`] holds
//! the pure transition rules; [`DtmfController`] runs them against a session
//! and hands back the effects the content has to carry out.

use crate::error::{MediaError, MediaResult};
use callbridge_core::{EngineSession, SendingState};
use std::sync::Arc;
use tracing::{debug, warn};

/// Volume used for every tone and expected back from the engine
pub const DTMF_TONE_VOLUME: u8 = 8;

/// Engine command implementing a peer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtmfCommand {
    /// Start playing a tone
    Start {
        /// Event code
        event: u8,
    },
    /// Stop the active tone
    Stop {
        /// Event code the peer asked to stop
        event: u8,
    },
}

/// Outcome of validating a peer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtmfTransition {
    /// Command to issue
    pub command: DtmfCommand,
    /// Stop whatever is playing before starting
    pub stop_active_first: bool,
    /// Description of a violated precondition; logged, never fatal
    pub inconsistency: Option<String>,
}

/// Pure DTMF transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfMachine {
    state: SendingState,
    current_event: u8,
    volume: u8,
}

impl Default for DtmfMachine {
    fn default() -> Self {
        Self::new(DTMF_TONE_VOLUME)
    }
}

impl DtmfMachine {
    /// Idle machine using `volume` for tones
    pub fn new(volume: u8) -> Self {
        Self {
            state: SendingState::None,
            current_event: 0,
            volume,
        }
    }

    /// Current sending state
    pub fn state(&self) -> SendingState {
        self.state
    }

    /// Event of the current or last tone
    pub fn current_event(&self) -> u8 {
        self.current_event
    }

    /// Tone volume
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Validate a peer request for `target`
    pub fn request(&self, event: u8, target: SendingState) -> MediaResult<DtmfTransition> {
        match target {
            SendingState::PendingSend => {
                let busy = self.state != SendingState::None;
                Ok(DtmfTransition {
                    command: DtmfCommand::Start { event },
                    stop_active_first: busy,
                    inconsistency: busy.then(|| {
                        format!(
                            "Tried to start a new DTMF event {} while {} is already playing",
                            event, self.current_event
                        )
                    }),
                })
            }
            SendingState::PendingStopSending => Ok(DtmfTransition {
                command: DtmfCommand::Stop { event },
                stop_active_first: false,
                inconsistency: (self.state != SendingState::Sending).then(|| {
                    format!(
                        "Tried to stop a {} DTMF event while state is {}",
                        event, self.state
                    )
                }),
            }),
            other => Err(MediaError::InvalidDtmfTarget {
                state: other.as_u32(),
            }),
        }
    }

    /// The engine accepted `command`
    pub fn command_accepted(&mut self, command: DtmfCommand) {
        match command {
            DtmfCommand::Start { event } => {
                self.current_event = event;
                self.state = SendingState::PendingSend;
            }
            DtmfCommand::Stop { .. } => {
                self.state = SendingState::PendingStopSending;
            }
        }
    }

    /// Acknowledgement reverting the peer's assumed state after the engine refused `command`
    pub fn command_rejected(&self, command: DtmfCommand) -> (u8, SendingState) {
        match command {
            DtmfCommand::Start { event } => (event, SendingState::None),
            DtmfCommand::Stop { event } => (event, SendingState::Sending),
        }
    }

    /// Engine confirmed a tone started; returns the acknowledgement to send
    pub fn engine_started(&mut self, event: u8, volume: u8) -> MediaResult<(u8, SendingState)> {
        if volume != self.volume {
            return Err(MediaError::DtmfDivergence {
                message: format!("DTMF volume is {}, while we use {}", volume, self.volume),
            });
        }
        if self.state != SendingState::PendingSend {
            return Err(MediaError::DtmfDivergence {
                message: format!(
                    "Engine started a DTMF event, but we were in the {} state",
                    self.state
                ),
            });
        }
        if self.current_event != event {
            return Err(MediaError::DtmfDivergence {
                message: format!(
                    "Engine started the wrong DTMF event, got {} but expected {}",
                    event, self.current_event
                ),
            });
        }

        self.state = SendingState::Sending;
        Ok((event, SendingState::Sending))
    }

    /// Engine confirmed the tone stopped; returns the acknowledgement to send
    pub fn engine_stopped(&mut self) -> MediaResult<(u8, SendingState)> {
        if self.state != SendingState::PendingStopSending {
            return Err(MediaError::DtmfDivergence {
                message: format!(
                    "Engine stopped a DTMF event, but we were in the {} state",
                    self.state
                ),
            });
        }

        self.state = SendingState::None;
        Ok((self.current_event, SendingState::None))
    }
}

/// Side effect requested by the controller
#[derive(Debug)]
pub enum DtmfEffect {
    /// Report a sending state to the peer
    Acknowledge {
        /// Event code
        event: u8,
        /// State to report
        state: SendingState,
    },
    /// Fail the content
    Fail(MediaError),
}

/// DTMF state of one content, including requests latched before negotiation
#[derive(Debug)]
pub struct DtmfController {
    machine: DtmfMachine,
    latched: Option<(u8, u32)>,
    armed: bool,
}

impl DtmfController {
    /// Idle controller using `volume` for tones
    pub fn new(volume: u8) -> Self {
        Self {
            machine: DtmfMachine::new(volume),
            latched: None,
            armed: false,
        }
    }

    /// Current sending state
    pub fn state(&self) -> SendingState {
        self.machine.state()
    }

    /// Event of the current or last tone
    pub fn current_event(&self) -> u8 {
        self.machine.current_event()
    }

    /// Request recorded while not armed, as (event, raw state)
    pub fn latched(&self) -> Option<(u8, u32)> {
        self.latched
    }

    /// Whether requests are executed immediately
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Handle a peer request; latched until [`arm`](Self::arm) when there is
    /// no session or no remote codecs yet
    pub fn request_change(
        &mut self,
        session: Option<&Arc<dyn EngineSession>>,
        event: u8,
        target: u32,
    ) -> Vec<DtmfEffect> {
        match session {
            Some(session) if self.armed => self.execute(session, event, target),
            _ => {
                debug!("Latching DTMF request for event {} state {}", event, target);
                self.latched = Some((event, target));
                Vec::new()
            }
        }
    }

    /// Start executing requests and replay the latched one, if any
    pub fn arm(&mut self, session: &Arc<dyn EngineSession>) -> Vec<DtmfEffect> {
        if self.armed {
            return Vec::new();
        }
        self.armed = true;

        match self.latched.take() {
            Some((event, target)) if target != SendingState::None.as_u32() => {
                debug!("Replaying latched DTMF request for event {}", event);
                self.execute(session, event, target)
            }
            _ => Vec::new(),
        }
    }

    fn execute(
        &mut self,
        session: &Arc<dyn EngineSession>,
        event: u8,
        target: u32,
    ) -> Vec<DtmfEffect> {
        let transition = match SendingState::from_u32(target)
            .ok_or(MediaError::InvalidDtmfTarget { state: target })
            .and_then(|state| self.machine.request(event, state))
        {
            Ok(transition) => transition,
            Err(err) => return vec![DtmfEffect::Fail(err)],
        };

        if let Some(message) = &transition.inconsistency {
            warn!("{}", message);
        }
        if transition.stop_active_first {
            if let Err(e) = session.stop_telephony_event() {
                debug!("Stopping the active DTMF event failed: {}", e);
            }
        }

        let result = match transition.command {
            DtmfCommand::Start { event } => {
                session.start_telephony_event(event, self.machine.volume())
            }
            DtmfCommand::Stop { .. } => session.stop_telephony_event(),
        };

        match result {
            Ok(()) => {
                self.machine.command_accepted(transition.command);
                Vec::new()
            }
            Err(source) => {
                let (event, state) = self.machine.command_rejected(transition.command);
                vec![
                    DtmfEffect::Fail(MediaError::TelephonyEvent { source }),
                    DtmfEffect::Acknowledge { event, state },
                ]
            }
        }
    }

    /// Engine reported a tone started
    pub fn on_engine_started(&mut self, event: u8, volume: u8) -> Vec<DtmfEffect> {
        match self.machine.engine_started(event, volume) {
            Ok((event, state)) => vec![DtmfEffect::Acknowledge { event, state }],
            Err(err) => vec![DtmfEffect::Fail(err)],
        }
    }

    /// Engine reported the tone stopped
    pub fn on_engine_stopped(&mut self) -> Vec<DtmfEffect> {
        match self.machine.engine_stopped() {
            Ok((event, state)) => vec![DtmfEffect::Acknowledge { event, state }],
            Err(err) => vec![DtmfEffect::Fail(err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_from_idle_is_consistent() {
        let machine = DtmfMachine::default();
        let transition = machine.request(3, SendingState::PendingSend).unwrap();
        assert_eq!(transition.command, DtmfCommand::Start { event: 3 });
        assert!(!transition.stop_active_first);
        assert!(transition.inconsistency.is_none());
    }

    #[test]
    fn test_start_while_playing_stops_first() {
        let mut machine = DtmfMachine::default();
        machine.command_accepted(DtmfCommand::Start { event: 1 });
        let transition = machine.request(2, SendingState::PendingSend).unwrap();
        assert!(transition.stop_active_first);
        assert!(transition.inconsistency.is_some());
    }

    #[test]
    fn test_stop_while_idle_is_logged_not_refused() {
        let machine = DtmfMachine::default();
        let transition = machine.request(5, SendingState::PendingStopSending).unwrap();
        assert_eq!(transition.command, DtmfCommand::Stop { event: 5 });
        assert!(transition.inconsistency.is_some());
    }

    #[test]
    fn test_sending_is_not_a_valid_target() {
        let machine = DtmfMachine::default();
        assert!(matches!(
            machine.request(1, SendingState::Sending),
            Err(MediaError::InvalidDtmfTarget { state: 2 })
        ));
    }

    #[test]
    fn test_full_cycle() {
        let mut machine = DtmfMachine::default();
        machine.command_accepted(DtmfCommand::Start { event: 3 });
        assert_eq!(machine.state(), SendingState::PendingSend);

        assert_eq!(
            machine.engine_started(3, DTMF_TONE_VOLUME).unwrap(),
            (3, SendingState::Sending)
        );

        machine.command_accepted(DtmfCommand::Stop { event: 3 });
        assert_eq!(machine.state(), SendingState::PendingStopSending);
        assert_eq!(machine.engine_stopped().unwrap(), (3, SendingState::None));
        assert_eq!(machine.state(), SendingState::None);
    }

    #[test]
    fn test_engine_divergence() {
        let mut machine = DtmfMachine::default();
        machine.command_accepted(DtmfCommand::Start { event: 3 });

        assert!(machine.engine_started(4, DTMF_TONE_VOLUME).is_err());
        assert!(machine.engine_started(3, 10).is_err());
        assert_eq!(machine.state(), SendingState::PendingSend);
        assert!(machine.engine_stopped().is_err());
    }

    #[test]
    fn test_rejected_commands_revert() {
        let machine = DtmfMachine::default();
        assert_eq!(
            machine.command_rejected(DtmfCommand::Start { event: 7 }),
            (7, SendingState::None)
        );
        assert_eq!(
            machine.command_rejected(DtmfCommand::Stop { event: 7 }),
            (7, SendingState::Sending)
        );
    }
}
