//! Modem link framing
//!
//! Wire format of the packet-radio modem: the sync word (little endian), one
//! length byte (`1..=MAX_FRAME_LEN`) and the payload.
//!
//! [`Receiver`] is the receive path the UART interrupt drives byte by byte.
//! It also owns the listen policy: armed once at bring-up, disarmed after a
//! completed receive or transmit unless continuous receive is on.
//! [`Transmitter`] holds one outgoing frame while the UART drains it.

use heapless::{Deque, Vec};

use crate::config::{MAX_FRAME_LEN, RX_QUEUE_DEPTH};
use crate::error::RadioError;
use crate::radio::{Frame, RadioEvents, RadioIsr};

pub const SYNC_WORD: [u8; 4] = 0x3E5D_5967u32.to_le_bytes();

/// Longest frame on the wire.
pub const MAX_WIRE_LEN: usize = SYNC_WORD.len() + 1 + MAX_FRAME_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Number of sync bytes matched so far.
    Sync(usize),
    Length,
    /// Declared payload length.
    Payload(usize),
}

#[derive(Debug)]
struct Assembler {
    phase: Phase,
    frame: Frame,
}

impl Assembler {
    const fn new() -> Self {
        Self {
            phase: Phase::Sync(0),
            frame: Frame::new(),
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Sync(0);
        self.frame.clear();
    }

    /// Consumes one byte. Returns the completion event when it ends a frame.
    fn push(&mut self, byte: u8) -> Option<RadioEvents> {
        match self.phase {
            Phase::Sync(matched) => {
                self.phase = if byte == SYNC_WORD[matched] {
                    if matched + 1 == SYNC_WORD.len() {
                        Phase::Length
                    } else {
                        Phase::Sync(matched + 1)
                    }
                } else if byte == SYNC_WORD[0] {
                    Phase::Sync(1)
                } else {
                    Phase::Sync(0)
                };
                None
            }
            Phase::Length => {
                let len = usize::from(byte);
                self.frame.clear();
                if len == 0 || len > MAX_FRAME_LEN {
                    self.phase = Phase::Sync(0);
                    return Some(RadioEvents::RX_FRAME_ERROR);
                }
                self.phase = Phase::Payload(len);
                None
            }
            Phase::Payload(len) => {
                // Capacity holds: len <= MAX_FRAME_LEN
                let _ = self.frame.push(byte);
                if self.frame.len() < len {
                    return None;
                }
                self.phase = Phase::Sync(0);
                Some(RadioEvents::RX_PACKET_RECEIVED)
            }
        }
    }
}

/// Receive side of the link.
#[derive(Debug)]
pub struct Receiver {
    assembler: Assembler,
    held: Deque<Frame, RX_QUEUE_DEPTH>,
    armed: bool,
    continuous: bool,
}

impl Receiver {
    pub const fn new() -> Self {
        Self {
            assembler: Assembler::new(),
            held: Deque::new(),
            armed: false,
            continuous: false,
        }
    }

    /// Bring-up policy: listen for one frame, continuous receive off.
    pub fn arm_once(&mut self) {
        self.assembler.reset();
        self.continuous = false;
        self.armed = true;
    }

    /// `true` keeps listening after every receive and transmit; `false`
    /// stops listening right away.
    pub fn set_continuous(&mut self, enabled: bool) {
        self.assembler.reset();
        self.continuous = enabled;
        self.armed = enabled;
    }

    /// A transmit completed; the radio only listens on in continuous mode.
    pub fn transmit_done(&mut self) {
        self.armed = self.continuous;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Consumes one received byte. Bytes are dropped while not armed.
    ///
    /// A frame that finds the hold queue full is reported as
    /// `RX_FIFO_OVERFLOW`. Any receive completion disarms a single-shot
    /// receiver.
    pub fn accept(&mut self, byte: u8) -> Option<RadioEvents> {
        if !self.armed {
            return None;
        }
        let mut events = self.assembler.push(byte)?;
        if events == RadioEvents::RX_PACKET_RECEIVED && self.held.is_full() {
            self.assembler.frame.clear();
            events = RadioEvents::RX_FIFO_OVERFLOW;
        }
        self.complete();
        Some(events)
    }

    /// UART line error: the frame in progress is lost.
    pub fn line_error(&mut self) -> Option<RadioEvents> {
        self.assembler.reset();
        if !self.armed {
            return None;
        }
        self.complete();
        Some(RadioEvents::RX_FRAME_ERROR)
    }

    /// Oldest held frame.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.held.pop_front()
    }

    fn complete(&mut self) {
        if !self.continuous {
            self.armed = false;
        }
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioIsr for Receiver {
    fn hold_packet(&mut self) {
        let frame = core::mem::take(&mut self.assembler.frame);
        // `accept` reported an overflow instead when the queue was full
        let _ = self.held.push_back(frame);
    }

    fn calibrate(&mut self) -> Result<(), RadioError> {
        // The modem calibrates itself
        Ok(())
    }
}

/// Transmit side of the link: one frame in flight at a time.
#[derive(Debug, Default)]
pub struct Transmitter {
    wire: Vec<u8, MAX_WIRE_LEN>,
    sent: usize,
}

impl Transmitter {
    pub const fn new() -> Self {
        Self {
            wire: Vec::new(),
            sent: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        !self.wire.is_empty()
    }

    /// Frames `payload` for sending.
    pub fn load(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        if self.is_busy() {
            return Err(RadioError::Busy);
        }
        let len = u8::try_from(payload.len())
            .ok()
            .filter(|&len| len > 0 && usize::from(len) <= MAX_FRAME_LEN)
            .ok_or(RadioError::FrameTooLong(payload.len()))?;

        // Fits: MAX_WIRE_LEN covers the largest accepted payload
        let _ = self.wire.extend_from_slice(&SYNC_WORD);
        let _ = self.wire.push(len);
        let _ = self.wire.extend_from_slice(payload);
        self.sent = 0;
        Ok(())
    }

    /// Bytes not yet handed to the UART.
    pub fn pending(&self) -> &[u8] {
        &self.wire[self.sent..]
    }

    /// Records `count` more bytes handed to the UART. Returns
    /// `TX_PACKET_SENT` once, when the last byte has gone.
    pub fn advance(&mut self, count: usize) -> Option<RadioEvents> {
        if !self.is_busy() {
            return None;
        }
        self.sent = (self.sent + count).min(self.wire.len());
        if self.sent < self.wire.len() {
            return None;
        }
        self.wire.clear();
        self.sent = 0;
        Some(RadioEvents::TX_PACKET_SENT)
    }
}
