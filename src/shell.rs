//! Command Facade
//!
//! A line-oriented shell fed byte by byte from the serial link. Commands only
//! post events or write to the output; they never touch the machine context.
//!
//! - `info`: unique device identifier
//! - `send`: request a packet send
//! - `receive <0|1>`: switch continuous receive off/on
//! - `help`: list commands

use core::fmt::{self, Write};

use heapless::{Deque, String};

use crate::config::LINE_CAPACITY;
use crate::shared::Shared;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShellError {
    UnknownCommand,
    /// Wrong number of arguments for the command.
    Usage(&'static str),
    InvalidArgument,
    LineTooLong,
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => f.write_str("unknown command, try `help`"),
            Self::Usage(usage) => write!(f, "usage: {}", usage),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::LineTooLong => f.write_str("line too long"),
        }
    }
}

/// What a command may reach.
pub struct ShellContext<'a> {
    pub shared: &'a Shared,
    pub device_id: u64,
}

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub brief: &'static str,
    /// Arguments after the command name.
    pub args: usize,
    pub handler: fn(&[&str], &ShellContext<'_>, &mut dyn Write) -> Result<(), ShellError>,
}

pub static COMMANDS: &[Command] = &[
    Command {
        name: "info",
        usage: "info",
        brief: "Display unique ID of the MCU",
        args: 0,
        handler: cmd_info,
    },
    Command {
        name: "send",
        usage: "send",
        brief: "Send a packet",
        args: 0,
        handler: cmd_send,
    },
    Command {
        name: "receive",
        usage: "receive <0|1>",
        brief: "Turn ON/OFF continuous packet receiving",
        args: 1,
        handler: cmd_receive,
    },
    Command {
        name: "help",
        usage: "help",
        brief: "List commands",
        args: 0,
        handler: cmd_help,
    },
];

const MAX_ARGS: usize = 4;

/// Runs one command line. Empty lines are accepted and do nothing.
pub fn execute(line: &str, ctx: &ShellContext<'_>, out: &mut dyn Write) -> Result<(), ShellError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(());
    };

    let command = COMMANDS
        .iter()
        .find(|c| c.name == name)
        .ok_or(ShellError::UnknownCommand)?;

    let mut args = [""; MAX_ARGS];
    let mut count = 0;
    for word in words {
        if count == MAX_ARGS {
            return Err(ShellError::Usage(command.usage));
        }
        args[count] = word;
        count += 1;
    }
    if count != command.args {
        return Err(ShellError::Usage(command.usage));
    }

    (command.handler)(&args[..count], ctx, out)
}

fn cmd_info(_args: &[&str], ctx: &ShellContext<'_>, out: &mut dyn Write) -> Result<(), ShellError> {
    let _ = write!(out, "Info:\r\n");
    let _ = write!(out, "  MCU Id:       0x{:x}\r\n", ctx.device_id);
    Ok(())
}

fn cmd_send(_args: &[&str], ctx: &ShellContext<'_>, out: &mut dyn Write) -> Result<(), ShellError> {
    let _ = write!(out, "Send packet request\r\n");
    ctx.shared.request_send();
    Ok(())
}

fn cmd_receive(
    args: &[&str],
    ctx: &ShellContext<'_>,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    let enabled = parse_number(args[0])? != 0;
    ctx.shared.request_receive_setting(enabled);
    let _ = write!(
        out,
        "Continuous packet receiving is {}\r\n",
        if enabled { "ON" } else { "OFF" }
    );
    Ok(())
}

fn cmd_help(
    _args: &[&str],
    _ctx: &ShellContext<'_>,
    out: &mut dyn Write,
) -> Result<(), ShellError> {
    for c in COMMANDS {
        let _ = write!(out, "  {:<16} {}\r\n", c.usage, c.brief);
    }
    Ok(())
}

/// Unsigned number in decimal, `0x` hex or leading-zero octal.
pub fn parse_number(text: &str) -> Result<u32, ShellError> {
    let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
    let (digits, radix) = if let Some(hex) = hex {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    u32::from_str_radix(digits, radix).map_err(|_| ShellError::InvalidArgument)
}

/// Collects bytes into lines and runs each completed line.
pub struct Shell {
    line: String<LINE_CAPACITY>,
    overflowed: bool,
}

impl Shell {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
            overflowed: false,
        }
    }

    /// Feeds received bytes, echoing them. Responses and errors go to `out`.
    pub fn feed(&mut self, bytes: &[u8], ctx: &ShellContext<'_>, out: &mut dyn Write) {
        for &byte in bytes {
            match byte {
                b'\r' | b'\n' => self.finish_line(ctx, out),
                // Backspace / DEL
                0x08 | 0x7f => {
                    if self.line.pop().is_some() {
                        let _ = out.write_str("\x08 \x08");
                    }
                }
                byte if byte.is_ascii() && !byte.is_ascii_control() => {
                    if self.line.push(byte as char).is_err() {
                        self.overflowed = true;
                    } else {
                        let _ = out.write_char(byte as char);
                    }
                }
                _ => {}
            }
        }
    }

    /// Text typed since the last line ending.
    pub fn pending(&self) -> &str {
        &self.line
    }

    fn finish_line(&mut self, ctx: &ShellContext<'_>, out: &mut dyn Write) {
        // A CR LF pair ends one line, not two
        if self.line.is_empty() && !self.overflowed {
            return;
        }
        let _ = out.write_str("\r\n");
        let result = if self.overflowed {
            Err(ShellError::LineTooLong)
        } else {
            execute(&self.line, ctx, out)
        };
        if let Err(err) = result {
            let _ = write!(out, "{}\r\n", err);
        }
        self.line.clear();
        self.overflowed = false;
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

/// Reply bytes waiting for the serial link. The link may take fewer bytes
/// than offered; the rest stays queued for the next `flush`.
pub struct Outbox<const N: usize> {
    bytes: Deque<u8, N>,
}

impl<const N: usize> Outbox<N> {
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offers queued bytes to `write`, which returns how many it took.
    /// Stops when everything is out or `write` takes nothing.
    pub fn flush<E>(
        &mut self,
        mut write: impl FnMut(&[u8]) -> Result<usize, E>,
    ) -> Result<(), E> {
        while !self.bytes.is_empty() {
            let (front, _) = self.bytes.as_slices();
            let taken = write(front)?.min(front.len());
            if taken == 0 {
                break;
            }
            for _ in 0..taken {
                self.bytes.pop_front();
            }
        }
        Ok(())
    }
}

impl<const N: usize> Default for Outbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fails once the queue is full; what fit stays queued.
impl<const N: usize> Write for Outbox<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.bytes.push_back(byte).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}
