//! Application constants

/// Payload handed to the radio on every send request.
pub const TEST_PAYLOAD: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
];

/// Size of the radio RX/TX FIFOs; no frame can be longer.
pub const MAX_FRAME_LEN: usize = 128;

/// Received frames the radio may hold before the main loop drains them.
pub const RX_QUEUE_DEPTH: usize = 4;

/// Longest command line the shell accepts.
pub const LINE_CAPACITY: usize = 64;

/// Shell reply bytes queued for the USB serial link.
pub const OUTBOX_CAPACITY: usize = 512;
