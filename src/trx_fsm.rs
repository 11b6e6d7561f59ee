use typed_fsm::{state_machine, Transition};

use crate::events::Events;

// FSM Context
#[derive(Debug, Default)]
pub struct MachineContext {
    pub send_in_progress: bool,
    pub continuous_receive_enabled: bool,
    pub last_error_code: u64,
    pub counters: Counters,
    // Facade work queued by the state entered last
    pub(crate) action: Option<Action>,
}

impl MachineContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Running totals, logged and inspected, never acted upon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub packets_sent: u32,
    pub sends_dropped: u32,
    pub frames_received: u32,
    pub radio_errors: u32,
}

// FSM Events
#[derive(Clone, Copy, Debug)]
pub enum TrxEvent {
    /// Bits returned by one `wait_any`.
    Observed(Events),
    /// The queued action has been performed.
    Completed,
}

/// Facade work a state asks the driver to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// GPIO and radio bring-up; fatal on failure.
    BringUp,
    /// Hand the test payload to the radio.
    Transmit,
    /// A send is already in flight; the request is dropped.
    DropSend,
    /// A transmit completed; toggle the send LED.
    AnnounceSent,
    /// Copy out every held frame; toggle the receive LED.
    DrainReceived,
    /// Log a radio error code.
    ReportError(u64),
    /// Switch the radio's continuous-receive policy.
    ApplyReceiveSetting(bool),
}

impl Action {
    /// Bits this action services; the driver clears exactly these.
    pub fn consumed(self) -> Events {
        match self {
            Action::BringUp => Events::empty(),
            Action::Transmit | Action::DropSend => Events::REQUEST_SEND,
            Action::AnnounceSent => Events::RADIO_PACKET_SENT,
            Action::DrainReceived => Events::RADIO_PACKET_RECEIVED,
            Action::ReportError(_) => Events::RADIO_ERROR,
            Action::ApplyReceiveSetting(_) => Events::RECEIVE_SETTING_CHANGED,
        }
    }
}

/// Target of an observation, highest priority first. Lower-priority bits
/// stay set and are picked up by the next `wait_any`.
pub fn next_state(observed: Events) -> Option<TrxFsm> {
    if observed.contains(Events::REQUEST_SEND) {
        Some(TrxFsm::Send)
    } else if observed.contains(Events::RADIO_PACKET_SENT) {
        Some(TrxFsm::Sent)
    } else if observed.contains(Events::RADIO_PACKET_RECEIVED) {
        Some(TrxFsm::Receive)
    } else if observed.contains(Events::RADIO_ERROR) {
        Some(TrxFsm::Error)
    } else {
        None
    }
}

// State Machine Definition
state_machine! {
    Name: TrxFsm,
    Context: MachineContext,
    Event: TrxEvent,
    States: {
        // State: one-time bring-up
        Init => {
            entry: |ctx| {
                ctx.send_in_progress = false;
                ctx.action = Some(Action::BringUp);
            }
            process: |_ctx, evt| {
                match evt {
                    TrxEvent::Completed => Transition::To(TrxFsm::Idle),
                    TrxEvent::Observed(_) => Transition::None,
                }
            }
        },

        // State: waiting for events
        Idle => {
            entry: |_ctx| {}
            process: |ctx, evt| {
                match evt {
                    TrxEvent::Observed(observed) => match next_state(*observed) {
                        Some(target) => Transition::To(target),
                        None => {
                            // Applied in place, no state change
                            if observed.contains(Events::RECEIVE_SETTING_CHANGED) {
                                ctx.action = Some(Action::ApplyReceiveSetting(
                                    ctx.continuous_receive_enabled,
                                ));
                            }
                            Transition::None
                        }
                    },
                    TrxEvent::Completed => Transition::None,
                }
            }
        },

        // State: transmit requested
        Send => {
            entry: |ctx| {
                if ctx.send_in_progress {
                    ctx.counters.sends_dropped = ctx.counters.sends_dropped.wrapping_add(1);
                    ctx.action = Some(Action::DropSend);
                } else {
                    ctx.send_in_progress = true;
                    ctx.action = Some(Action::Transmit);
                }
            }
            process: |_ctx, evt| {
                match evt {
                    TrxEvent::Completed => Transition::To(TrxFsm::Idle),
                    TrxEvent::Observed(_) => Transition::None,
                }
            }
        },

        // State: transmit finished
        Sent => {
            entry: |ctx| {
                ctx.send_in_progress = false;
                ctx.counters.packets_sent = ctx.counters.packets_sent.wrapping_add(1);
                ctx.action = Some(Action::AnnounceSent);
            }
            process: |_ctx, evt| {
                match evt {
                    TrxEvent::Completed => Transition::To(TrxFsm::Idle),
                    TrxEvent::Observed(_) => Transition::None,
                }
            }
        },

        // State: packets waiting in the radio
        Receive => {
            entry: |ctx| {
                ctx.action = Some(Action::DrainReceived);
            }
            process: |_ctx, evt| {
                match evt {
                    TrxEvent::Completed => Transition::To(TrxFsm::Idle),
                    TrxEvent::Observed(_) => Transition::None,
                }
            }
        },

        // State: radio reported an error
        Error => {
            entry: |ctx| {
                ctx.counters.radio_errors = ctx.counters.radio_errors.wrapping_add(1);
                ctx.action = Some(Action::ReportError(ctx.last_error_code));
                ctx.last_error_code = 0;
            }
            process: |_ctx, evt| {
                match evt {
                    TrxEvent::Completed => Transition::To(TrxFsm::Idle),
                    TrxEvent::Observed(_) => Transition::None,
                }
            }
        }
    }
}
