//! Hardware Abstraction Module
//!
//! This module handles the board bring-up of the RP2350 peripherals.
//! It encapsulates the setup of Clocks, PLLs, GPIOs, the modem UART and USB,
//! exposing a `Hardware` struct to the main application.

use rp235x_hal as hal;
use hal::Clock;
use hal::fugit::RateExtU32;
use hal::gpio::bank0::{Gpio0, Gpio1};
use hal::gpio::{
    DynPinId, FunctionSioInput, FunctionSioOutput, FunctionUart, Interrupt, Pin, PullDown, PullUp,
};
use hal::pac;
use hal::uart::{DataBits, Enabled, StopBits, UartConfig, UartPeripheral};

use crate::usb_module;

/// External crystal frequency used by the Raspberry Pi Pico 2 W.
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

/// Line rate of the packet-radio modem on UART0.
const MODEM_BAUD: u32 = 57_600;

/// OTP rows 0..=3 hold the 64-bit unique chip id, read through the
/// ECC-corrected data window (one 16-bit row per halfword).
const OTP_DATA_BASE: usize = 0x4013_0000;

pub type LedPin = Pin<DynPinId, FunctionSioOutput, PullDown>;
pub type ButtonPin = Pin<DynPinId, FunctionSioInput, PullUp>;
pub type ModemPins = (
    Pin<Gpio0, FunctionUart, PullDown>,
    Pin<Gpio1, FunctionUart, PullDown>,
);
pub type ModemUart = UartPeripheral<Enabled, pac::UART0, ModemPins>;

/// Peripherals the application needs after bring-up.
pub struct Hardware {
    /// Receive LED.
    pub led0: LedPin,
    /// Send LED.
    pub led1: LedPin,
    /// Active-low push buttons, falling-edge interrupt armed.
    pub buttons: [ButtonPin; 2],
    pub modem: ModemUart,
}

#[derive(Clone, Copy, Debug, defmt::Format)]
pub enum BringUpError {
    /// `Peripherals::take` was already called.
    PeripheralsTaken,
    /// Crystal or PLL did not start.
    Clocks,
    /// The modem UART rejected its configuration.
    ModemUart,
    /// USB descriptor setup failed.
    Usb,
}

/// Initializes the entire hardware stack.
///
/// This function:
/// 1.  Takes ownership of the raw PAC peripherals.
/// 2.  Configures the Watchdog and Clocks (System & USB).
/// 3.  Configures GPIO pins (LEDs, buttons with edge interrupt).
/// 4.  Enables the modem UART.
/// 5.  Initializes the USB Serial command shell.
///
/// Interrupts stay masked; the caller unmasks them once the handlers'
/// resources are in place.
pub fn init() -> Result<Hardware, BringUpError> {
    // 1. Take ownership of raw peripherals
    let mut pac = pac::Peripherals::take().ok_or(BringUpError::PeripheralsTaken)?;
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    // 2. Configure Clocks
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .map_err(|_| BringUpError::Clocks)?;

    // 3. Configure GPIOs
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let led0 = pins.gpio15.into_push_pull_output().into_dyn_pin();
    let led1 = pins.gpio16.into_push_pull_output().into_dyn_pin();

    let mut buttons = [
        pins.gpio14.into_pull_up_input().into_dyn_pin(),
        pins.gpio13.into_pull_up_input().into_dyn_pin(),
    ];
    for button in buttons.iter_mut() {
        button.set_interrupt_enabled(Interrupt::EdgeLow, true);
    }

    // 4. Configure the modem UART
    let modem_pins = (
        pins.gpio0.into_function::<FunctionUart>(),
        pins.gpio1.into_function::<FunctionUart>(),
    );
    let modem = UartPeripheral::new(pac.UART0, modem_pins, &mut pac.RESETS)
        .enable(
            UartConfig::new(MODEM_BAUD.Hz(), DataBits::Eight, None, StopBits::One),
            clocks.peripheral_clock.freq(),
        )
        .map_err(|_| BringUpError::ModemUart)?;

    // 5. Configure USB Serial (via module)
    usb_module::init(
        pac.USB,
        pac.USB_DPRAM,
        clocks.usb_clock,
        &mut pac.RESETS,
        chip_id(),
    )?;

    Ok(Hardware {
        led0,
        led1,
        buttons,
        modem,
    })
}

/// Unique identifier burnt into OTP at manufacture.
fn chip_id() -> u64 {
    (0..4).rev().fold(0u64, |id, row| {
        // Safety: read-only access to the always-mapped OTP data window.
        let half =
            unsafe { core::ptr::read_volatile((OTP_DATA_BASE + row * 2) as *const u16) };
        (id << 16) | u64::from(half)
    })
}
