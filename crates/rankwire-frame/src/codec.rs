use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::tag;

/// Fixed width of the leading packet of every message.
pub const PACKET_SIZE: usize = 512;

/// Header: size (8B LE) + tag (4B LE) + 4 bytes zero padding.
pub const HEADER_SIZE: usize = 16;

/// Payload bytes carried inside the leading packet.
pub const PREFIX_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

/// The size-and-tag envelope of a message.
///
/// Also serves as the payload of a receive announcement
/// ([`tag::REQUEST`]), where it describes the receive being posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Payload size in bytes.
    pub size: u64,
    /// Message tag.
    pub tag: i32,
}

impl Header {
    pub fn new(size: u64, tag: i32) -> Self {
        Self { size, tag }
    }

    /// Encode into the fixed wire layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut cursor = &mut bytes[..];
        cursor.put_u64_le(self.size);
        cursor.put_i32_le(self.tag);
        bytes
    }

    /// Decode from the fixed wire layout. `bytes` must be exactly
    /// [`HEADER_SIZE`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HEADER_SIZE {
            return None;
        }
        let mut cursor = bytes;
        let size = cursor.get_u64_le();
        let tag = cursor.get_i32_le();
        Some(Self { size, tag })
    }

    /// The matching rule: sizes must be equal, and this header's tag must
    /// agree with the posted receive `want` under [`tag::matches`] —
    /// [`tag::ANY`] in `want` accepts any tag, never the other way round.
    ///
    /// This single predicate governs message-to-receive matching, the
    /// deadlock detector's send-log lookups, and request correlation.
    pub fn matches(&self, want: &Header) -> bool {
        self.size == want.size && tag::matches(self.tag, want.tag)
    }
}

/// A decoded message: tag plus owned payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tag: i32,
    pub payload: Vec<u8>,
}

/// Write one complete message (blocking).
///
/// The leading packet is always written in full; payload beyond
/// [`PREFIX_SIZE`] follows directly from `payload` without an
/// intermediate copy.
pub fn write_message<W: Write>(writer: &mut W, tag: i32, payload: &[u8]) -> Result<()> {
    let mut packet = BytesMut::with_capacity(PACKET_SIZE);
    packet.put_slice(&Header::new(payload.len() as u64, tag).to_bytes());

    let prefix = payload.len().min(PREFIX_SIZE);
    packet.put_slice(&payload[..prefix]);
    packet.resize(PACKET_SIZE, 0);

    writer.write_all(&packet).map_err(write_failed)?;
    if payload.len() > PREFIX_SIZE {
        writer.write_all(&payload[PREFIX_SIZE..]).map_err(write_failed)?;
    }
    writer.flush().map_err(write_failed)?;
    Ok(())
}

/// Read one complete message (blocking).
///
/// Returns [`FrameError::Closed`] when the channel ends before a full
/// message arrived, including end-of-file at a packet boundary.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message> {
    let mut packet = [0u8; PACKET_SIZE];
    reader.read_exact(&mut packet).map_err(read_failed)?;

    let mut header = &packet[..HEADER_SIZE];
    let size = header.get_u64_le() as usize;
    let tag = header.get_i32_le();

    let mut payload = vec![0u8; size];
    let prefix = size.min(PREFIX_SIZE);
    payload[..prefix].copy_from_slice(&packet[HEADER_SIZE..HEADER_SIZE + prefix]);
    if size > PREFIX_SIZE {
        reader.read_exact(&mut payload[PREFIX_SIZE..]).map_err(read_failed)?;
    }

    Ok(Message { tag, payload })
}

fn read_failed(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::UnexpectedEof => FrameError::Closed,
        _ => FrameError::Io(err),
    }
}

fn write_failed(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::WriteZero => {
            FrameError::Closed
        }
        _ => FrameError::Io(err),
    }
}
