//! Packet Modem Module
//!
//! Radio backend for a transparent packet-radio modem wired to UART0.
//! `UART0_IRQ` stands in for the radio library's callback: it feeds
//! received bytes through the frame receiver, drains the outgoing frame
//! into the TX FIFO and reports completions through `on_radio_events`.

use core::cell::RefCell;
use critical_section::Mutex;
use defmt::*;

use rp235x_hal as hal;
use hal::pac;
use hal::uart::{Reader, Writer};

use rp235x_hal::pac::interrupt;

use trx_app::RadioError;
use trx_app::framing::{Receiver, Transmitter};
use trx_app::radio::{Frame, Radio, on_radio_events};

use crate::hardware::{ModemPins, ModemUart};

type ModemReader = Reader<pac::UART0, ModemPins>;
type ModemWriter = Writer<pac::UART0, ModemPins>;

// UART halves, owned by the interrupt handler
static READER: Mutex<RefCell<Option<ModemReader>>> = Mutex::new(RefCell::new(None));
static WRITER: Mutex<RefCell<Option<ModemWriter>>> = Mutex::new(RefCell::new(None));

static RECEIVER: Mutex<RefCell<Receiver>> = Mutex::new(RefCell::new(Receiver::new()));
static TRANSMITTER: Mutex<RefCell<Transmitter>> = Mutex::new(RefCell::new(Transmitter::new()));

/// Main-loop handle of the modem link.
pub struct Modem {
    _link: (),
}

impl Modem {
    /// Splits the UART and hands both halves to `UART0_IRQ`, which stays
    /// masked until `bring_up`.
    pub fn new(mut uart: ModemUart) -> Self {
        uart.enable_rx_interrupt();
        let (reader, writer) = uart.split();
        critical_section::with(|cs| {
            READER.borrow_ref_mut(cs).replace(reader);
            WRITER.borrow_ref_mut(cs).replace(writer);
        });
        Self { _link: () }
    }
}

impl Radio for Modem {
    fn bring_up(&mut self) -> Result<(), RadioError> {
        critical_section::with(|cs| RECEIVER.borrow_ref_mut(cs).arm_once());
        unsafe {
            cortex_m::peripheral::NVIC::unmask(pac::Interrupt::UART0_IRQ);
        }
        info!("Modem link up, receiver armed");
        Ok(())
    }

    /// Queues the frame; `UART0_IRQ` sends it and reports `TX_PACKET_SENT`.
    fn transmit_start(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        critical_section::with(|cs| {
            TRANSMITTER.borrow_ref_mut(cs).load(payload)?;
            if let Some(writer) = WRITER.borrow_ref_mut(cs).as_mut() {
                writer.enable_tx_interrupt();
            }
            Ok::<(), RadioError>(())
        })?;
        // The TX interrupt fires on a FIFO level crossing; kick the first fill
        cortex_m::peripheral::NVIC::pend(pac::Interrupt::UART0_IRQ);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        critical_section::with(|cs| RECEIVER.borrow_ref_mut(cs).next_frame())
    }

    fn set_continuous_receive(&mut self, enabled: bool) -> Result<(), RadioError> {
        critical_section::with(|cs| RECEIVER.borrow_ref_mut(cs).set_continuous(enabled));
        Ok(())
    }
}

/// Modem UART interrupt.
///
/// Receive: drains the RX FIFO through the frame receiver. Line errors abort
/// the frame in progress and are reported like a radio frame error.
/// Transmit: tops up the TX FIFO from the queued frame.
#[allow(non_snake_case)]
#[interrupt]
fn UART0_IRQ() {
    critical_section::with(|cs| {
        let mut receiver = RECEIVER.borrow_ref_mut(cs);

        if let Some(reader) = READER.borrow_ref_mut(cs).as_mut() {
            let mut buf = [0u8; 32];
            loop {
                match reader.read_raw(&mut buf) {
                    Ok(count) => {
                        for &byte in &buf[..count] {
                            if let Some(events) = receiver.accept(byte) {
                                on_radio_events(events, &mut *receiver, &crate::SHARED);
                            }
                        }
                    }
                    Err(nb::Error::WouldBlock) => break,
                    Err(nb::Error::Other(_)) => {
                        if let Some(events) = receiver.line_error() {
                            on_radio_events(events, &mut *receiver, &crate::SHARED);
                        }
                    }
                }
            }
        }

        let mut transmitter = TRANSMITTER.borrow_ref_mut(cs);
        if !transmitter.is_busy() {
            return;
        }
        if let Some(writer) = WRITER.borrow_ref_mut(cs).as_mut() {
            let pending = transmitter.pending();
            let left = match writer.write_raw(pending) {
                Ok(rest) => rest.len(),
                Err(nb::Error::WouldBlock) => pending.len(),
                Err(nb::Error::Other(never)) => match never {},
            };
            let written = pending.len() - left;
            if let Some(events) = transmitter.advance(written) {
                writer.disable_tx_interrupt();
                receiver.transmit_done();
                on_radio_events(events, &mut *receiver, &crate::SHARED);
            }
        }
    });
}
