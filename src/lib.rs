//! SPDX-License-Identifier: MIT OR Apache-2.0
//!
//! # Packet Radio Transceiver Application
//!
//! Sends a fixed test packet on a button press or `send` command, receives
//! packets on demand or continuously, and mirrors activity on two LEDs. All of
//! it is coordinated by one cooperative state machine:
//!
//! - **Event Set** (`events.rs`): bitmask that interrupt handlers, the radio
//!   callback and the shell post into; the main loop blocks on it.
//! - **Mailboxes** (`shared.rs`): the error code and receive setting travel
//!   from producers to the main loop here, never through the context.
//! - **FSM** (`trx_fsm.rs`): typed state machine, `Init` / `Idle` / `Send` /
//!   `Sent` / `Receive` / `Error`.
//! - **Driver** (`machine.rs`): owns context and facades, runs the loop.
//! - **Facades**: radio (`radio.rs`), LEDs (`gpio.rs`), shell (`shell.rs`).
//! - **Framing** (`framing.rs`): wire format and listen policy of the UART
//!   packet modem the firmware uses as its radio.
//!
//! The firmware binary supplies the board: RP2350, USB-serial shell, UART
//! packet-radio modem.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod events;
pub mod framing;
pub mod gpio;
pub mod machine;
pub mod radio;
pub mod shared;
pub mod shell;
pub mod trx_fsm;

pub use error::{Error, RadioError};
pub use events::{EventSet, Events};
pub use fmt::Hex;
pub use machine::{Machine, State};
pub use shared::Shared;
pub use trx_fsm::{Action, Counters, MachineContext};
