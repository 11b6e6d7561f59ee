//! Error types

use core::fmt;

use embedded_hal::digital::ErrorKind;

/// Failure reported by the radio library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioError {
    /// Non-zero status code returned by a radio call.
    Status(u32),
    /// The TX FIFO accepted fewer bytes than requested.
    Truncated { written: u16, expected: u16 },
    /// Frame does not fit the radio FIFO.
    FrameTooLong(usize),
    /// The previous frame is still going out.
    Busy,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "radio status {}", code),
            Self::Truncated { written, expected } => {
                write!(f, "FIFO took {} bytes instead of {}", written, expected)
            }
            Self::FrameTooLong(len) => write!(f, "frame of {} bytes exceeds FIFO", len),
            Self::Busy => f.write_str("transmitter busy"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RadioError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Status(code) => defmt::write!(f, "radio status {}", code),
            Self::Truncated { written, expected } => {
                defmt::write!(f, "FIFO took {} bytes instead of {}", written, expected)
            }
            Self::FrameTooLong(len) => defmt::write!(f, "frame of {} bytes exceeds FIFO", len),
            Self::Busy => defmt::write!(f, "transmitter busy"),
        }
    }
}

/// Fatal bring-up failure. Raised only while the machine is in `Init`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// An LED or button pin could not be configured.
    Gpio(ErrorKind),
    /// The radio could not be brought up.
    Radio(RadioError),
}

impl From<RadioError> for Error {
    fn from(err: RadioError) -> Self {
        Error::Radio(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpio(kind) => write!(f, "gpio: {}", kind),
            Self::Radio(err) => write!(f, "radio: {}", err),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Gpio(kind) => defmt::write!(f, "gpio: {}", defmt::Debug2Format(kind)),
            Self::Radio(err) => defmt::write!(f, "radio: {}", err),
        }
    }
}

impl core::error::Error for Error {}
