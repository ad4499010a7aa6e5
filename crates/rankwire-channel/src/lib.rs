//! Byte-stream channels between the ranks of a rankwire job.
//!
//! A job consists of `N` processes wired all-to-all with dedicated
//! unidirectional channels. The launcher creates the channels and places
//! each process's endpoints at well-known descriptor offsets before exec;
//! this crate adopts those descriptors and exposes them as blocking
//! [`ChannelReader`] / [`ChannelWriter`] endpoints.
//!
//! This is the lowest layer of rankwire. Everything else builds on top of
//! the endpoint types and the wiring contract defined here.

pub mod endpoint;
pub mod error;
pub mod wiring;

pub use endpoint::{pair, ChannelReader, ChannelWriter};
pub use error::{ChannelError, Result};
pub use wiring::{
    reader_fd, writer_fd, JobEnv, MAX_WORLD_SIZE, READER_FD_BASE, STAGING_FD_BASE, WRITER_FD_BASE,
};
