//! Wire format for the echo exchange.
//!
//! Each request and each response is a single fixed-size binary payload.
//! The bytes are opaque; only size and round-trip timing matter.

/// Size of every request and response, in bytes.
pub const MESSAGE_SIZE: usize = 16;

/// Payload sent by client workers. Content is arbitrary.
pub const PAYLOAD: [u8; MESSAGE_SIZE] = *b"ABCDEFGHIJKMLNOP";
