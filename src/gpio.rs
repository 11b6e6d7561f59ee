//! GPIO Facade
//!
//! LED indication on top of `embedded-hal` output pins. LED0 shows receive
//! activity; LED1, when the board has one, shows send activity, otherwise
//! LED0 is shared.
//!
//! Buttons need no wrapper here: their interrupt handler only calls
//! [`Shared::request_send`](crate::Shared::request_send).

use embedded_hal::digital::{Error as _, ErrorKind, StatefulOutputPin};

pub struct Leds<P> {
    led0: P,
    led1: Option<P>,
}

impl<P: StatefulOutputPin> Leds<P> {
    pub fn new(led0: P, led1: Option<P>) -> Self {
        Self { led0, led1 }
    }

    /// Drives every LED low. Part of bring-up.
    pub fn reset(&mut self) -> Result<(), ErrorKind> {
        self.led0.set_low().map_err(|e| e.kind())?;
        if let Some(led1) = self.led1.as_mut() {
            led1.set_low().map_err(|e| e.kind())?;
        }
        Ok(())
    }

    pub fn toggle_receive(&mut self) -> Result<(), ErrorKind> {
        self.led0.toggle().map_err(|e| e.kind())
    }

    pub fn toggle_send(&mut self) -> Result<(), ErrorKind> {
        match self.led1.as_mut() {
            Some(led1) => led1.toggle(),
            None => self.led0.toggle(),
        }
        .map_err(|e| e.kind())
    }

    pub fn led0(&self) -> &P {
        &self.led0
    }

    pub fn led1(&self) -> Option<&P> {
        self.led1.as_ref()
    }
}
