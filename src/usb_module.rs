//! USB Module
//!
//! This module carries the command shell over USB Serial.
//! It manages the global static resources required for the USB stack,
//! handles the initialization, and implements the `USBCTRL_IRQ` interrupt handler
//! which feeds received bytes to the shell and writes its replies back.

use core::cell::{Cell, RefCell};
use critical_section::Mutex;
use defmt::*;
use usb_device::prelude::*;
use usb_device::UsbError;
use usbd_serial::SerialPort;

use rp235x_hal as hal;
use hal::pac;

use rp235x_hal::pac::interrupt;

use trx_app::config::OUTBOX_CAPACITY;
use trx_app::shell::{Outbox, Shell, ShellContext};

use crate::hardware::BringUpError;

type UsbBusType = hal::usb::UsbBus;

// Global USB Objects (Mutex protected for ISR access)
static USB_DEVICE: Mutex<RefCell<Option<UsbDevice<UsbBusType>>>> = Mutex::new(RefCell::new(None));
static USB_SERIAL: Mutex<RefCell<Option<SerialPort<UsbBusType>>>> = Mutex::new(RefCell::new(None));

// Shell line state and unsent replies survive across interrupts
static SHELL: Mutex<RefCell<Shell>> = Mutex::new(RefCell::new(Shell::new()));
static OUTBOX: Mutex<RefCell<Outbox<OUTBOX_CAPACITY>>> = Mutex::new(RefCell::new(Outbox::new()));
static DEVICE_ID: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));

/// Initialize USB Serial and enable the USB interrupt.
///
/// `device_id` is what the shell's `info` command reports.
pub fn init(
    usb_periph: pac::USB,
    usb_dpram: pac::USB_DPRAM,
    usb_clock: hal::clocks::UsbClock,
    resets: &mut pac::RESETS,
    device_id: u64,
) -> Result<(), BringUpError> {
    // 1. Create the USB Bus
    let usb_bus = hal::usb::UsbBus::new(
        usb_periph,
        usb_dpram,
        usb_clock,
        true,
        resets,
    );

    // 2. Create static allocator
    static mut USB_BUS: Option<usb_device::bus::UsbBusAllocator<hal::usb::UsbBus>> = None;

    // Safety: This is called only once at initialization time, before interrupts are enabled.
    let bus_allocator: &'static _ = unsafe {
        let bus_ptr = core::ptr::addr_of_mut!(USB_BUS);
        (*bus_ptr).insert(usb_device::bus::UsbBusAllocator::new(usb_bus))
    };

    // 3. Create Device and Serial Port
    let serial = SerialPort::new(bus_allocator);
    let usb_dev = UsbDeviceBuilder::new(bus_allocator, UsbVidPid(0x16c0, 0x27dd))
        .strings(&[StringDescriptors::default()
            .manufacturer("Raspberry Pi")
            .product("Pico 2 W Packet Transceiver")
            .serial_number("TRX001")])
        .map_err(|_| BringUpError::Usb)?
        .device_class(usbd_serial::USB_CLASS_CDC)
        .build();

    // 4. Move to Global Storage
    critical_section::with(|cs| {
        USB_DEVICE.borrow_ref_mut(cs).replace(usb_dev);
        USB_SERIAL.borrow_ref_mut(cs).replace(serial);
        DEVICE_ID.borrow(cs).set(device_id);
    });

    // 5. Enable Interrupt
    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::USBCTRL_IRQ);
    }
    Ok(())
}

/// USB Interrupt Handler
///
/// Handles enumeration, then runs every received chunk through the shell.
/// Replies are queued and written as far as the endpoint takes them; the
/// rest goes out on later interrupts.
/// Commands only post events, so the handler never waits on the main loop.
#[allow(non_snake_case)]
#[interrupt]
fn USBCTRL_IRQ() {
    critical_section::with(|cs| {
        let mut dev = USB_DEVICE.borrow_ref_mut(cs);
        let mut serial = USB_SERIAL.borrow_ref_mut(cs);
        let mut outbox = OUTBOX.borrow_ref_mut(cs);

        if let (Some(dev), Some(serial)) = (dev.as_mut(), serial.as_mut()) {
            if dev.poll(&mut [serial]) {
                let mut buf = [0u8; 64];
                if let Ok(count) = serial.read(&mut buf) {
                    let ctx = ShellContext {
                        shared: &crate::SHARED,
                        device_id: DEVICE_ID.borrow(cs).get(),
                    };
                    // Output past the outbox capacity is cut short
                    SHELL.borrow_ref_mut(cs).feed(&buf[..count], &ctx, &mut *outbox);
                }
            }

            let flushed = outbox.flush(|chunk| match serial.write(chunk) {
                Ok(count) => Ok(count),
                Err(UsbError::WouldBlock) => Ok(0),
                Err(err) => Err(err),
            });
            if let Err(err) = flushed {
                warn!("USB serial write failed: {}", Debug2Format(&err));
            }
        }
    });
}
