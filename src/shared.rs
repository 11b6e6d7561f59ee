//! Producer-facing mailboxes
//!
//! Producers never touch the machine context. They hand data over through a
//! single-slot mailbox and only then post the matching event bit, so the
//! consumer always reads the value that belongs to the bit it observed.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::events::{EventSet, Events};

pub struct Shared {
    pub events: EventSet,
    error_code: Mutex<Cell<Option<u64>>>,
    continuous_receive: AtomicBool,
}

impl Shared {
    pub const fn new() -> Self {
        Self {
            events: EventSet::new(),
            error_code: Mutex::new(Cell::new(None)),
            continuous_receive: AtomicBool::new(false),
        }
    }

    /// Button press or `send` command.
    pub fn request_send(&self) {
        self.events.post(Events::REQUEST_SEND);
    }

    /// Stores the new continuous-receive setting, then announces it.
    pub fn request_receive_setting(&self, enabled: bool) {
        self.continuous_receive.store(enabled, Ordering::Release);
        self.events.post(Events::RECEIVE_SETTING_CHANGED);
    }

    /// Latest value handed over by `request_receive_setting`.
    pub fn receive_setting(&self) -> bool {
        self.continuous_receive.load(Ordering::Acquire)
    }

    /// Stores the raw radio event word, then posts `RADIO_ERROR`. A newer
    /// error overwrites one the consumer has not picked up yet.
    pub fn raise_error(&self, code: u64) {
        critical_section::with(|cs| self.error_code.borrow(cs).set(Some(code)));
        self.events.post(Events::RADIO_ERROR);
    }

    /// Empties the error mailbox.
    pub fn take_error_code(&self) -> Option<u64> {
        critical_section::with(|cs| self.error_code.borrow(cs).take())
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}
