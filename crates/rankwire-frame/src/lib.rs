//! Fixed-size packet framing for rankwire channels.
//!
//! Every message starts with one 512-byte packet:
//! - A 16-byte header: payload size (8B LE), tag (4B LE), 4 bytes padding
//! - Up to 496 bytes of payload prefix
//!
//! Payloads longer than the prefix continue as a raw byte tail with no
//! further framing. Small messages cost exactly one write and one read;
//! large messages are transferred without an extra copy of the tail.

pub mod codec;
pub mod error;
pub mod tag;

pub use codec::{read_message, write_message, Header, Message, HEADER_SIZE, PACKET_SIZE, PREFIX_SIZE};
pub use error::{FrameError, Result};
