//! Event Set
//!
//! A process-wide bitmask that interrupt handlers, the radio callback and the
//! command shell post into, and that the main loop blocks on.
//!
//! `wait_any` never clears anything: one observation may carry several
//! pending events, and each state action clears exactly the bits it has
//! serviced so a bit posted concurrently is never lost.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};
use core::sync::atomic::{AtomicU32, Ordering};

/// Set of application events, one bit each.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Events(u32);

impl Events {
    /// A packet send was requested by a button press or the `send` command.
    pub const REQUEST_SEND: Events = Events(1 << 0);
    /// The `receive` command changed the continuous-receive setting.
    pub const RECEIVE_SETTING_CHANGED: Events = Events(1 << 1);
    /// The radio is holding at least one received packet.
    pub const RADIO_PACKET_RECEIVED: Events = Events(1 << 2);
    /// The radio finished transmitting.
    pub const RADIO_PACKET_SENT: Events = Events(1 << 3);
    /// The radio reported an error; the code is in the error mailbox.
    pub const RADIO_ERROR: Events = Events(1 << 4);

    /// Every event the state machine reacts to.
    pub const ALL: Events = Events(
        Self::REQUEST_SEND.0
            | Self::RECEIVE_SETTING_CHANGED.0
            | Self::RADIO_PACKET_RECEIVED.0
            | Self::RADIO_PACKET_SENT.0
            | Self::RADIO_ERROR.0,
    );

    const NAMES: [(Events, &'static str); 5] = [
        (Self::REQUEST_SEND, "RequestSend"),
        (Self::RECEIVE_SETTING_CHANGED, "ReceiveSettingChanged"),
        (Self::RADIO_PACKET_RECEIVED, "RadioPacketReceived"),
        (Self::RADIO_PACKET_SENT, "RadioPacketSent"),
        (Self::RADIO_ERROR, "RadioError"),
    ];

    pub const fn empty() -> Self {
        Events(0)
    }

    /// Keeps only the bits that name a known event.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Events(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set in `self`.
    pub const fn contains(self, other: Events) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Events) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn intersection(self, other: Events) -> Self {
        Events(self.0 & other.0)
    }
}

impl BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

impl BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Events) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (event, name) in Self::NAMES {
            if self.contains(event) {
                set.entry(&format_args!("{}", name));
            }
        }
        set.finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Events {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Events({=u32:#b})", self.0)
    }
}

/// The shared bit word. Any context may `post`; only the main loop waits
/// and clears.
pub struct EventSet {
    bits: AtomicU32,
}

impl EventSet {
    pub const fn new() -> Self {
        Self {
            bits: AtomicU32::new(0),
        }
    }

    /// ORs `events` into the set. Never blocks, safe from interrupt context.
    pub fn post(&self, events: Events) {
        if events.is_empty() {
            return;
        }
        self.bits.fetch_or(events.bits(), Ordering::Release);
        signal();
    }

    /// Current bits within `mask`, without waiting.
    pub fn peek(&self, mask: Events) -> Events {
        Events(self.bits.load(Ordering::Acquire) & mask.bits())
    }

    /// Blocks until at least one bit of `mask` is set and returns all set
    /// bits within `mask`. Nothing is cleared.
    pub fn wait_any(&self, mask: Events) -> Events {
        loop {
            let seen = self.peek(mask);
            if !seen.is_empty() {
                return seen;
            }
            idle();
        }
    }

    /// Clears `events` once the consumer has fully serviced them.
    pub fn clear(&self, events: Events) {
        self.bits.fetch_and(!events.bits(), Ordering::AcqRel);
    }
}

impl Default for EventSet {
    fn default() -> Self {
        Self::new()
    }
}

// A `post` from an interrupt between the check and the `wfe` still sets the
// event register, so the wait cannot miss it.
#[cfg(all(target_arch = "arm", target_os = "none"))]
fn idle() {
    cortex_m::asm::wfe();
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
fn signal() {
    cortex_m::asm::sev();
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn idle() {
    core::hint::spin_loop();
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn signal() {}
