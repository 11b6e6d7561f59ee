//! State machine driver
//!
//! Owns the machine context and the facades, and runs the cooperative loop:
//! block on the Event Set, let the FSM pick a state, perform the action that
//! state queued, clear the bits it consumed, settle back in `Idle`.

use core::convert::Infallible;

use embedded_hal::digital::StatefulOutputPin;

use crate::config::TEST_PAYLOAD;
use crate::error::{Error, RadioError};
use crate::events::Events;
use crate::fmt::Hex;
use crate::gpio::Leds;
use crate::radio::{receive_drain, Radio};
use crate::shared::Shared;
use crate::trx_fsm::{Action, MachineContext, TrxEvent, TrxFsm};

/// Observable state, for logs and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Init,
    Idle,
    Send,
    Sent,
    Receive,
    Error,
}

pub struct Machine<'a, R, P> {
    fsm: TrxFsm,
    ctx: MachineContext,
    shared: &'a Shared,
    radio: R,
    leds: Leds<P>,
}

impl<'a, R, P> Machine<'a, R, P>
where
    R: Radio,
    P: StatefulOutputPin,
{
    pub fn new(shared: &'a Shared, radio: R, leds: Leds<P>) -> Self {
        Self {
            fsm: TrxFsm::Init,
            ctx: MachineContext::new(),
            shared,
            radio,
            leds,
        }
    }

    /// Runs the `Init` action and settles in `Idle`. An error here is fatal;
    /// nothing is retried.
    pub fn start(&mut self) -> Result<(), Error> {
        info!("INIT STATE");
        self.fsm.init(&mut self.ctx);
        if let Some(Action::BringUp) = self.ctx.action.take() {
            self.bring_up()?;
        }
        self.fsm.dispatch(&mut self.ctx, &TrxEvent::Completed);
        info!("Press the button or type `send`");
        Ok(())
    }

    /// `start`, then wait/dispatch forever.
    pub fn run(mut self) -> Result<Infallible, Error> {
        self.start()?;
        loop {
            self.step();
        }
    }

    /// Blocks until an event arrives, then services it.
    pub fn step(&mut self) -> Option<Action> {
        let observed = self.shared.events.wait_any(Events::ALL);
        self.handle(observed)
    }

    /// Services whatever is pending without blocking. `None` when nothing is.
    pub fn poll(&mut self) -> Option<Action> {
        let observed = self.shared.events.peek(Events::ALL);
        if observed.is_empty() {
            return None;
        }
        self.handle(observed)
    }

    /// One dispatch cycle for an observed bit set. Returns the action that
    /// was performed. The machine is back in `Idle` afterwards.
    pub fn handle(&mut self, observed: Events) -> Option<Action> {
        debug!("observed {}", observed.bits());

        if observed.contains(Events::RECEIVE_SETTING_CHANGED) {
            self.ctx.continuous_receive_enabled = self.shared.receive_setting();
        }
        if observed.contains(Events::RADIO_ERROR) {
            if let Some(code) = self.shared.take_error_code() {
                self.ctx.last_error_code = code;
            }
        }

        self.fsm.dispatch(&mut self.ctx, &TrxEvent::Observed(observed));

        let action = self.ctx.action.take();
        if let Some(action) = action {
            self.perform(action);
            self.shared.events.clear(action.consumed());
        }

        self.fsm.dispatch(&mut self.ctx, &TrxEvent::Completed);
        action
    }

    pub fn state(&self) -> State {
        match self.fsm {
            TrxFsm::Init => State::Init,
            TrxFsm::Idle => State::Idle,
            TrxFsm::Send => State::Send,
            TrxFsm::Sent => State::Sent,
            TrxFsm::Receive => State::Receive,
            TrxFsm::Error => State::Error,
        }
    }

    pub fn context(&self) -> &MachineContext {
        &self.ctx
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn leds(&self) -> &Leds<P> {
        &self.leds
    }

    fn bring_up(&mut self) -> Result<(), Error> {
        if let Err(kind) = self.leds.reset() {
            error!("LED and button init failed");
            return Err(Error::Gpio(kind));
        }
        if let Err(err) = self.radio.bring_up() {
            error!("Radio bring-up failed: {}", err);
            return Err(Error::Radio(err));
        }
        Ok(())
    }

    // Steady state: failures are logged and never change the transition.
    fn perform(&mut self, action: Action) {
        match action {
            Action::BringUp => {}
            Action::Transmit => {
                info!("SEND STATE");
                match self.radio.transmit_start(&TEST_PAYLOAD) {
                    Ok(()) => info!("Packet is being sent"),
                    Err(err @ RadioError::Truncated { .. }) => {
                        warn!("TX FIFO write incomplete: {}", err);
                    }
                    Err(err) => {
                        // Nothing will ever complete this send
                        warn!("Transmit start failed: {}", err);
                        self.ctx.send_in_progress = false;
                    }
                }
            }
            Action::DropSend => {
                info!("SEND STATE");
                warn!("Sending is in progress");
            }
            Action::AnnounceSent => {
                info!("SENT STATE");
                info!("Packet successfully sent");
                if let Err(kind) = self.leds.toggle_send() {
                    warn!("Send LED toggle failed: {}", Error::Gpio(kind));
                }
            }
            Action::DrainReceived => {
                info!("RECEIVE STATE");
                let counters = &mut self.ctx.counters;
                for frame in receive_drain(&mut self.radio) {
                    info!("Length of packet: {}", frame.len());
                    info!("Received Packet: {}", Hex(frame.as_slice()));
                    counters.frames_received = counters.frames_received.wrapping_add(1);
                }
                if let Err(kind) = self.leds.toggle_receive() {
                    warn!("Receive LED toggle failed: {}", Error::Gpio(kind));
                }
            }
            Action::ReportError(code) => {
                info!("ERROR STATE");
                error!("Radio error occurred, events: {:#x}", code);
            }
            Action::ApplyReceiveSetting(enabled) => {
                info!("IDLE STATE");
                match self.radio.set_continuous_receive(enabled) {
                    Ok(()) => {
                        let mode = if enabled { "on" } else { "off" };
                        info!("Continuous receive {}", mode);
                    }
                    Err(err) => error!("Setting continuous receive failed: {}", err),
                }
            }
        }
    }
}
