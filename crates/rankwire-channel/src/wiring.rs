//! The descriptor and environment contract between the launcher and a worker.
//!
//! Before exec, the launcher moves each worker's channel endpoints to fixed
//! offsets: the inbound channel from peer `p` lands at `READER_FD_BASE + p`
//! and the outbound channel to peer `p` at `WRITER_FD_BASE + p`. The worker's
//! rank and the world size travel in environment variables.

use std::env;
use std::os::fd::RawFd;

use tracing::trace;

use crate::endpoint::{ChannelReader, ChannelWriter};
use crate::error::{ChannelError, Result};

/// Largest world the descriptor table can address.
pub const MAX_WORLD_SIZE: usize = 128;

/// Offset of the inbound channel from peer 0.
pub const READER_FD_BASE: RawFd = 128;

/// Offset of the outbound channel to peer 0.
pub const WRITER_FD_BASE: RawFd = 256;

/// First descriptor the launcher may use for staging channel ends before
/// moving them into place; guaranteed disjoint from the reader and writer
/// regions.
pub const STAGING_FD_BASE: RawFd = 384;

/// Descriptor of the inbound channel from `peer`.
pub fn reader_fd(peer: usize) -> RawFd {
    READER_FD_BASE + peer as RawFd
}

/// Descriptor of the outbound channel to `peer`.
pub fn writer_fd(peer: usize) -> RawFd {
    WRITER_FD_BASE + peer as RawFd
}

/// Adopt the inherited inbound channel from `peer`.
///
/// # Safety
///
/// The process must have been started by the launcher (or an equivalent
/// wiring step) so that the descriptor at [`reader_fd`]`(peer)` is open,
/// unowned elsewhere in the process, and never adopted twice.
pub unsafe fn inherited_reader(peer: usize) -> ChannelReader {
    trace!(peer, fd = reader_fd(peer), "adopting inbound channel");
    ChannelReader::from_raw(reader_fd(peer))
}

/// Adopt the inherited outbound channel to `peer`.
///
/// # Safety
///
/// Same contract as [`inherited_reader`], for [`writer_fd`]`(peer)`.
pub unsafe fn inherited_writer(peer: usize) -> ChannelWriter {
    trace!(peer, fd = writer_fd(peer), "adopting outbound channel");
    ChannelWriter::from_raw(writer_fd(peer))
}

/// Rank and world size of this worker, as published by the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEnv {
    pub rank: usize,
    pub size: usize,
}

impl JobEnv {
    /// Environment variable carrying this worker's rank.
    pub const RANK_VAR: &'static str = "RANKWIRE_RANK";
    /// Environment variable carrying the world size.
    pub const SIZE_VAR: &'static str = "RANKWIRE_SIZE";

    /// Read and validate the job environment.
    pub fn from_env() -> Result<Self> {
        Self::parse(
            env::var(Self::RANK_VAR).ok().as_deref(),
            env::var(Self::SIZE_VAR).ok().as_deref(),
        )
    }

    fn parse(rank: Option<&str>, size: Option<&str>) -> Result<Self> {
        let rank = parse_var(Self::RANK_VAR, rank)?;
        let size = parse_var(Self::SIZE_VAR, size)?;

        if size == 0 || size > MAX_WORLD_SIZE {
            return Err(ChannelError::WorldTooLarge {
                size,
                max: MAX_WORLD_SIZE,
            });
        }
        if rank >= size {
            return Err(ChannelError::RankOutOfRange { rank, size });
        }

        Ok(Self { rank, size })
    }
}

fn parse_var(name: &'static str, value: Option<&str>) -> Result<usize> {
    let value = value.ok_or(ChannelError::MissingEnv { name })?;
    value
        .trim()
        .parse()
        .map_err(|_| ChannelError::InvalidEnv {
            name,
            value: value.to_string(),
        })
}
