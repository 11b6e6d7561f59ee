//! Radio Facade
//!
//! The radio library is reached only through [`Radio`] (main loop side) and
//! [`RadioIsr`] (callback side). [`on_radio_events`] is the adapter the
//! library's event callback calls: it turns the library's event word into
//! application events.

use core::ops::{BitOr, BitOrAssign};

use heapless::Vec;

use crate::config::MAX_FRAME_LEN;
use crate::error::RadioError;
use crate::events::Events;
use crate::shared::Shared;

/// A received frame as copied out of the radio's RX FIFO.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// Main-loop side of the radio library.
pub trait Radio {
    /// One-time bring-up: FIFO setup, interrupt hookup, receiver armed once.
    fn bring_up(&mut self) -> Result<(), RadioError>;

    /// Starts an asynchronous transmit. Completion or failure arrives later
    /// through [`on_radio_events`].
    fn transmit_start(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    /// Oldest held frame, releasing it from the radio. Never blocks.
    fn next_frame(&mut self) -> Option<Frame>;

    /// `true`: listen again after every RX/TX. `false`: go idle.
    fn set_continuous_receive(&mut self, enabled: bool) -> Result<(), RadioError>;
}

/// Every frame currently held by the radio, oldest first.
pub fn receive_drain<R: Radio + ?Sized>(radio: &mut R) -> impl Iterator<Item = Frame> + '_ {
    core::iter::from_fn(move || radio.next_frame())
}

/// Operations the radio library allows from its own callback context.
pub trait RadioIsr {
    /// Keep the packet that just completed so the main loop can read it.
    fn hold_packet(&mut self);

    /// Run every calibration the library flagged as pending.
    fn calibrate(&mut self) -> Result<(), RadioError>;
}

/// Event word delivered by the radio library's callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioEvents(u64);

impl RadioEvents {
    pub const RX_PACKET_RECEIVED: RadioEvents = RadioEvents(1 << 3);
    pub const RX_FRAME_ERROR: RadioEvents = RadioEvents(1 << 8);
    pub const RX_FIFO_OVERFLOW: RadioEvents = RadioEvents(1 << 10);
    pub const RX_ADDRESS_FILTERED: RadioEvents = RadioEvents(1 << 11);
    pub const RX_SCHEDULED_RX_MISSED: RadioEvents = RadioEvents(1 << 15);
    pub const RX_PACKET_ABORTED: RadioEvents = RadioEvents(1 << 16);
    pub const TX_PACKET_SENT: RadioEvents = RadioEvents(1 << 24);
    pub const TX_ABORTED: RadioEvents = RadioEvents(1 << 26);
    pub const TX_BLOCKED: RadioEvents = RadioEvents(1 << 28);
    pub const TX_UNDERFLOW: RadioEvents = RadioEvents(1 << 30);
    pub const TX_CHANNEL_BUSY: RadioEvents = RadioEvents(1 << 33);
    pub const TX_SCHEDULED_TX_MISSED: RadioEvents = RadioEvents(1 << 37);
    pub const CAL_NEEDED: RadioEvents = RadioEvents(1 << 41);

    /// Exactly one of these ends every receive.
    pub const RX_COMPLETION: RadioEvents = RadioEvents(
        Self::RX_PACKET_RECEIVED.0
            | Self::RX_PACKET_ABORTED.0
            | Self::RX_FRAME_ERROR.0
            | Self::RX_FIFO_OVERFLOW.0
            | Self::RX_ADDRESS_FILTERED.0
            | Self::RX_SCHEDULED_RX_MISSED.0,
    );

    /// Exactly one of these ends every transmit.
    pub const TX_COMPLETION: RadioEvents = RadioEvents(
        Self::TX_PACKET_SENT.0
            | Self::TX_ABORTED.0
            | Self::TX_BLOCKED.0
            | Self::TX_UNDERFLOW.0
            | Self::TX_CHANNEL_BUSY.0
            | Self::TX_SCHEDULED_TX_MISSED.0,
    );

    pub const fn empty() -> Self {
        RadioEvents(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        RadioEvents(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: RadioEvents) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: RadioEvents) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for RadioEvents {
    type Output = RadioEvents;

    fn bitor(self, rhs: RadioEvents) -> RadioEvents {
        RadioEvents(self.0 | rhs.0)
    }
}

impl BitOrAssign for RadioEvents {
    fn bitor_assign(&mut self, rhs: RadioEvents) {
        self.0 |= rhs.0;
    }
}

/// Radio callback adapter. Runs in the radio library's context.
///
/// - a completed receive holds the packet and posts `RADIO_PACKET_RECEIVED`
/// - a completed transmit posts `RADIO_PACKET_SENT`
/// - any other completion, or a failed calibration, stores the raw event
///   word in the error mailbox and posts `RADIO_ERROR`
pub fn on_radio_events<I: RadioIsr + ?Sized>(events: RadioEvents, isr: &mut I, shared: &Shared) {
    let mut failed = false;

    if events.intersects(RadioEvents::RX_COMPLETION) {
        if events.contains(RadioEvents::RX_PACKET_RECEIVED) {
            // The main loop copies it out in the Receive state
            isr.hold_packet();
            shared.events.post(Events::RADIO_PACKET_RECEIVED);
        } else {
            failed = true;
        }
    }

    if events.intersects(RadioEvents::TX_COMPLETION) {
        if events.contains(RadioEvents::TX_PACKET_SENT) {
            shared.events.post(Events::RADIO_PACKET_SENT);
        } else {
            failed = true;
        }
    }

    if events.contains(RadioEvents::CAL_NEEDED) && isr.calibrate().is_err() {
        failed = true;
    }

    if failed {
        shared.raise_error(events.bits());
    }
}
