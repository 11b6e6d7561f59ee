//! SPDX-License-Identifier: MIT OR Apache-2.0
//!
//! # Packet Radio Transceiver Firmware
//!
//! Board shell around the `trx_app` library:
//! - **Hardware Module:** HAL setup, LEDs, buttons, modem UART (`hardware.rs`).
//! - **USB Module:** command shell over USB Serial (`usb_module.rs`).
//! - **Modem Module:** UART packet-radio backend (`modem.rs`).
//!
//! Interrupt handlers only post into `SHARED`; the state machine runs in
//! `main` and sleeps between events.
//!
//! Target: Raspberry Pi Pico 2 W (RP2350).

#![no_std]
#![no_main]

// --- Imports ---
use core::cell::RefCell;
use critical_section::Mutex;
use defmt::*;
use defmt_rtt as _;
use panic_probe as _;

// --- Modules ---
mod hardware;
mod modem;
mod usb_module;

use trx_app::gpio::Leds;
use trx_app::{Machine, Shared};

// --- HAL Selection ---
use rp235x_hal as hal;
use hal::entry;
use hal::gpio::Interrupt::EdgeLow;
use hal::pac;

use rp235x_hal::pac::interrupt;

// --- Bootloader Configuration ---

#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: hal::block::ImageDef = hal::block::ImageDef::secure_exe();

// --- Shared State ---

/// Event Set and mailboxes every interrupt handler posts into.
pub static SHARED: Shared = Shared::new();

static BUTTONS: Mutex<RefCell<Option<[hardware::ButtonPin; 2]>>> = Mutex::new(RefCell::new(None));

/// Entry point.
#[entry]
fn main() -> ! {
    info!("Program start");

    // 1. Initialize Hardware Stack (Clocks, GPIO, UART, USB)
    let hw = match hardware::init() {
        Ok(hw) => hw,
        Err(err) => halt(err),
    };

    // 2. Hand the buttons to their interrupt handler
    critical_section::with(|cs| {
        BUTTONS.borrow_ref_mut(cs).replace(hw.buttons);
    });
    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::IO_IRQ_BANK0);
    }

    // 3. Build the machine over the board facades
    let leds = Leds::new(hw.led0, Some(hw.led1));
    let radio = modem::Modem::new(hw.modem);
    let machine = Machine::new(&SHARED, radio, leds);

    // 4. Main Application Loop
    match machine.run() {
        Ok(never) => match never {},
        Err(err) => halt(err),
    }
}

/// Bring-up failed; nothing is retried.
fn halt(err: impl Format) -> ! {
    error!("Fatal: {}", err);
    loop {
        cortex_m::asm::wfi();
    }
}

// --- Interrupt Handlers ---

/// Button edge interrupt. Any pressed button requests a send.
#[allow(non_snake_case)]
#[interrupt]
fn IO_IRQ_BANK0() {
    critical_section::with(|cs| {
        if let Some(buttons) = BUTTONS.borrow_ref_mut(cs).as_mut() {
            for button in buttons.iter_mut() {
                if button.interrupt_status(EdgeLow) {
                    button.clear_interrupt(EdgeLow);
                    SHARED.request_send();
                }
            }
        }
    });
}

// --- Metadata ---

#[unsafe(link_section = ".bi_entries")]
#[used]
pub static PICOTOOL_ENTRIES: [hal::binary_info::EntryAddr; 4] = [
    hal::binary_info::rp_cargo_bin_name!(),
    hal::binary_info::rp_cargo_version!(),
    hal::binary_info::rp_program_description!(c"Packet radio transceiver"),
    hal::binary_info::rp_program_build_attribute!()
];
